//! Command implementations for the termsync CLI.

use std::fs;
use std::sync::Arc;

use serde_json::Value;

use crate::cli::args::*;
use crate::cli::output::output_result;
use crate::error::{Result, TermSyncError};
use crate::model::AffectedNodes;
use crate::store::memory::MemoryTermedStore;
use crate::sync::SyncEngine;
use crate::transport::http::HttpIndexClient;

/// Execute a CLI command against the configured index store.
pub async fn execute_command(args: TermSyncArgs) -> Result<()> {
    let config = args.load_config()?;
    let store = match &args.snapshot {
        Some(path) => MemoryTermedStore::from_file(path)?,
        None => MemoryTermedStore::new(),
    };
    let transport = HttpIndexClient::new(&config.transport)?;
    let engine = SyncEngine::new(config, Arc::new(store), Arc::new(transport));
    run(&engine, &args).await
}

/// Execute a CLI command with an already built engine.
pub async fn run(engine: &SyncEngine, args: &TermSyncArgs) -> Result<()> {
    match &args.command {
        Command::Init => {
            let report = engine.bootstrap().await?;
            output_result("Indices ready", &report, args)
        }
        Command::Reindex => {
            let report = engine.reindex_all().await?;
            output_result("Reindex finished", &report, args)
        }
        Command::Sync(sync_args) => sync(engine, sync_args, args).await,
        Command::Search(search_args) => search(engine, search_args, args).await,
    }
}

async fn sync(engine: &SyncEngine, sync_args: &SyncArgs, args: &TermSyncArgs) -> Result<()> {
    let content = fs::read_to_string(&sync_args.descriptor)?;
    let nodes: AffectedNodes = serde_json::from_str(&content).map_err(|e| {
        TermSyncError::invalid_argument(format!(
            "invalid descriptor {}: {e}",
            sync_args.descriptor.display()
        ))
    })?;

    let report = if sync_args.delete {
        engine.sync_after_delete(&nodes).await?
    } else {
        engine.sync_after_update(&nodes).await?
    };
    output_result("Sync finished", &report, args)
}

async fn search(engine: &SyncEngine, search_args: &SearchArgs, args: &TermSyncArgs) -> Result<()> {
    let query: Value = serde_json::from_str(&search_args.query)
        .map_err(|e| TermSyncError::invalid_argument(format!("query is not JSON: {e}")))?;
    let result = engine
        .search(search_args.index.as_deref(), query.to_string().as_bytes())
        .await?;
    output_result("Search results", &result, args)
}
