//! Outcome of one synchronization call.

use serde::Serialize;

/// The path a synchronization call took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Full,
    Collections,
    Incremental,
    /// Removal of a collection together with its concepts.
    CascadeDelete,
    /// Removal of single concepts.
    ConceptDelete,
}

/// A store-level failure that was logged and stepped over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedOperation {
    pub operation: &'static str,
    pub index: String,
    /// Number of documents the operation carried.
    pub documents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

/// What a synchronization call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub strategy: Strategy,
    /// Documents accepted for upsert.
    pub indexed: usize,
    /// Documents accepted for deletion by id.
    pub deleted: usize,
    pub failures: Vec<FailedOperation>,
}

impl SyncReport {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            indexed: 0,
            deleted: 0,
            failures: Vec::new(),
        }
    }

    /// No store-level failure happened.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold the counts and failures of another report into this one.
    pub fn absorb(&mut self, other: SyncReport) {
        self.indexed += other.indexed;
        self.deleted += other.deleted;
        self.failures.extend(other.failures);
    }
}
