//! Rebuilding both indices from the store.

use log::info;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::store::TermedStore;
use crate::sync::report::{Strategy, SyncReport};
use crate::sync::writer::IndexWriter;
use crate::transport::IndexTransport;

/// Writes a document for every collection and every concept in the store.
///
/// Documents are upserted; nothing is deleted, so a document whose record
/// has vanished from the store survives a full reindex. Wipe the indices
/// first to get rid of those.
#[derive(Debug, Clone, Copy)]
pub struct FullReindexer<'a> {
    config: &'a SyncConfig,
    store: &'a dyn TermedStore,
    transport: &'a dyn IndexTransport,
}

impl<'a> FullReindexer<'a> {
    pub fn new(config: &'a SyncConfig, store: &'a dyn TermedStore, transport: &'a dyn IndexTransport) -> Self {
        Self {
            config,
            store,
            transport,
        }
    }

    /// Reindex everything. Collection documents are written before any
    /// concept document.
    pub async fn run(&self, wait_for_refresh: bool) -> Result<SyncReport> {
        let ids = self.store.collection_ids().await?;
        self.run_for(&ids, true, wait_for_refresh).await
    }

    /// Reindex the given collections. With `with_documents` the collection
    /// documents themselves are rewritten too, otherwise only their concepts.
    pub async fn run_for(&self, ids: &[Uuid], with_documents: bool, wait_for_refresh: bool) -> Result<SyncReport> {
        let mut report = SyncReport::new(Strategy::Full);
        if ids.is_empty() {
            info!("no collections to reindex");
            return Ok(report);
        }

        let writer = IndexWriter::new(self.transport, self.config.bulk_batch_size);

        if with_documents {
            let mut collections = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(collection) = self.store.collection(*id).await? {
                    collections.push(collection);
                }
            }
            writer
                .write_collections(
                    &self.config.collection_index.name,
                    &collections,
                    &[],
                    wait_for_refresh,
                    &mut report,
                )
                .await?;
        }

        for id in ids {
            let concepts = self.store.all_concepts(*id).await?;
            info!("reindexing {} concepts of collection {id}", concepts.len());
            writer
                .write_concepts(&self.config.concept_index.name, &concepts, wait_for_refresh, &mut report)
                .await?;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Collection, CollectionSummary, Concept};
    use crate::store::memory::MemoryTermedStore;
    use crate::transport::memory::MemoryIndex;

    fn populated(collections: u128, concepts_each: u128) -> MemoryTermedStore {
        let store = MemoryTermedStore::new();
        for c in 0..collections {
            let summary = CollectionSummary::new(Uuid::from_u128(1000 + c), format!("http://uri.example/{c}"));
            store.put_collection(Collection::new(summary.clone()));
            for k in 0..concepts_each {
                store.put_concept(Concept::new(Uuid::from_u128(c * 100 + k), summary.clone()));
            }
        }
        store
    }

    #[tokio::test]
    async fn test_full_reindex_writes_everything() {
        let store = populated(2, 3);
        let index = MemoryIndex::new();
        let config = SyncConfig::default();

        let report = FullReindexer::new(&config, &store, &index).run(true).await.unwrap();

        assert_eq!(report.indexed, 8);
        assert!(report.is_clean());
        assert_eq!(index.document_count("vocabularies"), 2);
        assert_eq!(index.document_count("concepts"), 6);

        let requests = index.requests();
        assert_eq!(requests[0].index, "vocabularies");
        assert!(requests.iter().all(|request| request.wait_for_refresh));
    }

    #[tokio::test]
    async fn test_empty_store_sends_nothing() {
        let store = MemoryTermedStore::new();
        let index = MemoryIndex::new();
        let config = SyncConfig::default();

        let report = FullReindexer::new(&config, &store, &index).run(false).await.unwrap();

        assert_eq!(report.indexed, 0);
        assert!(index.requests().is_empty());
    }

    #[tokio::test]
    async fn test_concepts_are_batched() {
        let store = populated(1, 5);
        let index = MemoryIndex::new();
        let config = SyncConfig {
            bulk_batch_size: 2,
            ..SyncConfig::default()
        };

        FullReindexer::new(&config, &store, &index).run(false).await.unwrap();

        let concept_requests = index.requests().iter().filter(|r| r.index == "concepts").count();
        assert_eq!(concept_requests, 3);
    }

    #[tokio::test]
    async fn test_failing_collection_index_does_not_stop_concepts() {
        let store = populated(1, 2);
        let index = MemoryIndex::new();
        index.set_failing("vocabularies", true);
        let config = SyncConfig::default();

        let report = FullReindexer::new(&config, &store, &index).run(true).await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.indexed, 2);
        assert_eq!(index.document_count("concepts"), 2);
    }
}
