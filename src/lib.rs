//! # termsync
//!
//! Keeps a search index in step with an authoritative terminology store.
//!
//! The store holds collections (vocabularies) of concepts linked by
//! broader/narrower relations. The index holds one document per collection
//! and one per concept, and each concept document embeds data of its direct
//! neighbors. After every edit the [`sync::SyncEngine`] rewrites exactly the
//! documents the edit made stale, or rebuilds whole collections when the edit
//! is too large for that to pay off.
//!
//! ## Modules
//!
//! - [`model`]: concepts, collections and the affected-set descriptor
//! - [`store`]: read access to the authoritative store
//! - [`transport`]: the index store protocol, over HTTP or in memory
//! - [`bulk`]: rendering of bulk mutation payloads
//! - [`sync`]: the decision engine, closure expansion and reindexing

pub mod bulk;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod sync;
pub mod transport;

pub mod prelude {
    pub use crate::config::{ReindexThresholds, SyncConfig};
    pub use crate::error::{Result, TermSyncError};
    pub use crate::model::{AffectedNodes, Collection, CollectionSummary, Concept};
    pub use crate::store::TermedStore;
    pub use crate::sync::{SyncEngine, SyncReport};
    pub use crate::transport::IndexTransport;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
