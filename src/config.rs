//! Configuration for the synchronization engine.
//!
//! Everything the engine needs to know about its environment lives in one
//! [`SyncConfig`] value that is passed to constructors. Configuration files are
//! JSON; every field is optional and falls back to its default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TermSyncError};

const CONCEPTS_SETTINGS: &str = include_str!("../resources/concepts_settings.json");
const CONCEPTS_MAPPINGS: &str = include_str!("../resources/concepts_mappings.json");
const VOCABULARIES_SETTINGS: &str = include_str!("../resources/vocabularies_settings.json");
const VOCABULARIES_MAPPINGS: &str = include_str!("../resources/vocabularies_mappings.json");

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Connection to the index store.
    pub transport: TransportConfig,

    /// Index holding one document per concept.
    pub concept_index: IndexConfig,

    /// Index holding one document per collection.
    pub collection_index: IndexConfig,

    /// Size limits steering the reindex decision.
    pub thresholds: ReindexThresholds,

    /// Drop and recreate both indices when bootstrapping.
    pub delete_indices_on_start: bool,

    /// Run a full reindex on bootstrap even if the indices already existed.
    pub full_reindex_on_start: bool,

    /// Maximum number of documents rendered into one bulk request.
    pub bulk_batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            concept_index: IndexConfig::new("concepts"),
            collection_index: IndexConfig::new("vocabularies"),
            thresholds: ReindexThresholds::default(),
            delete_indices_on_start: false,
            full_reindex_on_start: false,
            bulk_batch_size: 1000,
        }
    }
}

impl SyncConfig {
    /// Load a configuration from a JSON file and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TermSyncError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: SyncConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the index store would reject.
    pub fn validate(&self) -> Result<()> {
        validate_index_name(&self.concept_index.name)?;
        validate_index_name(&self.collection_index.name)?;

        if self.concept_index.name == self.collection_index.name {
            return Err(TermSyncError::config(format!(
                "concept and collection indices must differ, both are '{}'",
                self.concept_index.name
            )));
        }
        if self.bulk_batch_size == 0 {
            return Err(TermSyncError::config("bulk_batch_size must be positive"));
        }
        if self.transport.timeout_secs == 0 {
            return Err(TermSyncError::config("transport timeout must be positive"));
        }
        Ok(())
    }
}

/// Connection settings for the index store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Base URL, e.g. `http://localhost:9200`.
    pub url: String,

    /// Upper bound for every single request, in seconds.
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            timeout_secs: 30,
        }
    }
}

impl TransportConfig {
    /// Create a transport configuration for the given base URL.
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// The request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which of the two managed indices a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRole {
    Concepts,
    Collections,
}

/// Name and creation resources of one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index name in the store.
    pub name: String,

    /// JSON file with the index settings sent on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<PathBuf>,

    /// JSON file with the mapping put after creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings: Option<PathBuf>,
}

impl IndexConfig {
    /// Create an index configuration using the built-in resources.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            settings: None,
            mappings: None,
        }
    }

    /// Use a settings file instead of the built-in settings.
    pub fn with_settings<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings = Some(path.into());
        self
    }

    /// Use a mappings file instead of the built-in mapping.
    pub fn with_mappings<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.mappings = Some(path.into());
        self
    }

    /// Body for the index creation request.
    pub fn settings_body(&self, role: IndexRole) -> Result<Vec<u8>> {
        let builtin = match role {
            IndexRole::Concepts => CONCEPTS_SETTINGS,
            IndexRole::Collections => VOCABULARIES_SETTINGS,
        };
        load_json_resource(self.settings.as_deref(), builtin)
    }

    /// Body for the put-mapping request.
    pub fn mappings_body(&self, role: IndexRole) -> Result<Vec<u8>> {
        let builtin = match role {
            IndexRole::Concepts => CONCEPTS_MAPPINGS,
            IndexRole::Collections => VOCABULARIES_MAPPINGS,
        };
        load_json_resource(self.mappings.as_deref(), builtin)
    }
}

/// Size limits above which computing an incremental diff is not worth it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReindexThresholds {
    /// More affected collections than this triggers a full reindex.
    pub collections: usize,

    /// More affected concepts than this triggers a per-collection reindex.
    pub concepts: usize,
}

impl Default for ReindexThresholds {
    fn default() -> Self {
        Self {
            collections: 20,
            concepts: 20,
        }
    }
}

impl ReindexThresholds {
    pub fn new(collections: usize, concepts: usize) -> Self {
        Self {
            collections,
            concepts,
        }
    }
}

/// Read a JSON resource and normalize it to compact form.
fn load_json_resource(path: Option<&Path>, builtin: &str) -> Result<Vec<u8>> {
    let raw = match path {
        Some(path) => fs::read_to_string(path).map_err(|e| {
            TermSyncError::config(format!("cannot read resource {}: {e}", path.display()))
        })?,
        None => builtin.to_string(),
    };
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Reject names the index store refuses to create.
fn validate_index_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TermSyncError::config("index name must not be empty"));
    }
    if name.starts_with(['-', '_', '+']) {
        return Err(TermSyncError::config(format!(
            "index name '{name}' must not start with '-', '_' or '+'"
        )));
    }
    if name == "." || name == ".." {
        return Err(TermSyncError::config(format!("index name '{name}' is reserved")));
    }
    if let Some(c) = name.chars().find(|c| {
        c.is_uppercase() || c.is_whitespace() || matches!(c, '\\' | '/' | '*' | '?' | '"' | '<' | '>' | '|' | ',' | '#' | ':')
    }) {
        return Err(TermSyncError::config(format!(
            "index name '{name}' contains illegal character '{c}'"
        )));
    }
    Ok(())
}
