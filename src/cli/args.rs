//! Command line argument parsing for the termsync binary using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::error::Result;

/// termsync - keep a search index in step with a terminology store
#[derive(Parser, Debug, Clone)]
#[command(name = "termsync")]
#[command(about = "Keep a search index in step with a terminology store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct TermSyncArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "json")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Index store URL, overrides the configuration file
    #[arg(long, env = "TERMSYNC_URL", value_name = "URL")]
    pub url: Option<String>,

    /// Snapshot of the authoritative store (JSON)
    #[arg(short, long, value_name = "SNAPSHOT_FILE")]
    pub snapshot: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl TermSyncArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }

    /// Configuration from `--config` (or defaults) with command line overrides applied.
    pub fn load_config(&self) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::from_file(path)?,
            None => SyncConfig::default(),
        };
        if let Some(url) = &self.url {
            config.transport.url = url.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create missing indices and fill them
    Init,

    /// Empty both indices and rebuild them from the snapshot
    Reindex,

    /// Apply one affected-set descriptor
    Sync(SyncArgs),

    /// Run a raw query against an index
    Search(SearchArgs),
}

/// Arguments for applying a descriptor
#[derive(Parser, Debug, Clone)]
pub struct SyncArgs {
    /// Descriptor file (JSON)
    #[arg(value_name = "DESCRIPTOR_FILE")]
    pub descriptor: PathBuf,

    /// The descriptor lists removed nodes instead of changed ones
    #[arg(long)]
    pub delete: bool,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Index to query (default: the concept index)
    #[arg(short, long)]
    pub index: Option<String>,

    /// Query body (JSON)
    #[arg(value_name = "QUERY")]
    pub query: String,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_sync_command() {
        let args = TermSyncArgs::try_parse_from([
            "termsync",
            "--snapshot",
            "store.json",
            "sync",
            "changes.json",
            "--delete",
        ])
        .unwrap();

        assert_eq!(args.snapshot, Some(PathBuf::from("store.json")));
        if let Command::Sync(sync_args) = args.command {
            assert_eq!(sync_args.descriptor, PathBuf::from("changes.json"));
            assert!(sync_args.delete);
        } else {
            panic!("Expected Sync command");
        }
    }

    #[test]
    fn test_search_command() {
        let args = TermSyncArgs::try_parse_from([
            "termsync",
            "search",
            "--index",
            "vocabularies",
            r#"{"query":{"match_all":{}}}"#,
        ])
        .unwrap();

        if let Command::Search(search_args) = args.command {
            assert_eq!(search_args.index.as_deref(), Some("vocabularies"));
            assert_eq!(search_args.query, r#"{"query":{"match_all":{}}}"#);
        } else {
            panic!("Expected Search command");
        }
    }

    #[test]
    fn test_verbosity_levels() {
        let args = TermSyncArgs::try_parse_from(["termsync", "init"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = TermSyncArgs::try_parse_from(["termsync", "-vv", "init"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = TermSyncArgs::try_parse_from(["termsync", "-vvv", "--quiet", "init"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args = TermSyncArgs::try_parse_from(["termsync", "reindex"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);

        let args = TermSyncArgs::try_parse_from(["termsync", "--format", "human", "reindex"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Human);
    }

    #[test]
    fn test_url_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"transport": {{"url": "http://from-file:9200"}}, "bulk_batch_size": 50}}"#).unwrap();
        let config_path = file.path().to_str().unwrap().to_string();

        let args = TermSyncArgs::try_parse_from([
            "termsync",
            "--config",
            &config_path,
            "--url",
            "http://from-flag:9200",
            "init",
        ])
        .unwrap();

        let config = args.load_config().unwrap();
        assert_eq!(config.transport.url, "http://from-flag:9200");
        assert_eq!(config.bulk_batch_size, 50);
    }
}
