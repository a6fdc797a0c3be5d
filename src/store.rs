//! Access to the authoritative graph store.
//!
//! The synchronization engine only ever reads from the store, through the
//! narrow [`TermedStore`] trait. [`memory::MemoryTermedStore`] keeps the
//! records in process, loaded from a JSON snapshot or built up by hand; it
//! backs the tests and the command line tool.
//!
//! # Example
//!
//! ```
//! use termsync::model::{Collection, CollectionSummary, Concept};
//! use termsync::store::TermedStore;
//! use termsync::store::memory::MemoryTermedStore;
//! use uuid::Uuid;
//!
//! # tokio_test::block_on(async {
//! let graph = Uuid::from_u128(1);
//! let summary = CollectionSummary::new(graph, "http://uri.example/terminology/1");
//!
//! let store = MemoryTermedStore::new();
//! store.put_collection(Collection::new(summary.clone()));
//! store.put_concept(Concept::new(Uuid::from_u128(2), summary));
//!
//! let concepts = store.all_concepts(graph).await.unwrap();
//! assert_eq!(concepts.len(), 1);
//! # });
//! ```

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Collection, Concept};

pub mod memory;

/// Read access to collections and concepts of the authoritative store.
///
/// Ids that do not exist (any more) are not an error: single lookups return
/// `None` and batch lookups leave them out. Errors are reserved for the store
/// itself being unreachable or broken.
#[async_trait]
pub trait TermedStore: Send + Sync + std::fmt::Debug {
    /// Ids of every collection.
    async fn collection_ids(&self) -> Result<Vec<Uuid>>;

    /// One collection record.
    async fn collection(&self, id: Uuid) -> Result<Option<Collection>>;

    /// The given concepts of a collection, in request order, skipping unknown ids.
    async fn concepts(&self, collection_id: Uuid, ids: &[Uuid]) -> Result<Vec<Concept>>;

    /// Every concept of a collection.
    async fn all_concepts(&self, collection_id: Uuid) -> Result<Vec<Concept>>;
}
