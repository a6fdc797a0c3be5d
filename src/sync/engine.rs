//! The synchronization entry points.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::{IndexConfig, IndexRole, SyncConfig};
use crate::error::Result;
use crate::model::AffectedNodes;
use crate::store::TermedStore;
use crate::sync::closure::ClosureExpander;
use crate::sync::decision::{ReindexPlan, decide};
use crate::sync::full::FullReindexer;
use crate::sync::report::{Strategy, SyncReport};
use crate::sync::writer::IndexWriter;
use crate::transport::{DeleteQuery, IndexTransport};

/// What [`SyncEngine::bootstrap`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// Indices dropped because the configuration asked for it.
    pub deleted: Vec<String>,
    /// Indices created with settings and mappings.
    pub created: Vec<String>,
    /// Indices that could not be created or mapped.
    pub failed: Vec<String>,
    /// The full reindex, if one ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reindex: Option<SyncReport>,
}

/// Keeps the concept and collection indices in step with a [`TermedStore`].
///
/// The engine holds no state between calls and takes no locks. Callers must
/// not run two synchronizations of the same collection at the same time;
/// the engine gives no ordering guarantee between concurrent calls.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use termsync::config::SyncConfig;
/// use termsync::model::{AffectedNodes, CollectionSummary, Concept};
/// use termsync::store::memory::MemoryTermedStore;
/// use termsync::sync::SyncEngine;
/// use termsync::transport::memory::MemoryIndex;
/// use uuid::Uuid;
///
/// # tokio_test::block_on(async {
/// let graph = Uuid::from_u128(1);
/// let store = Arc::new(MemoryTermedStore::new());
/// store.put_concept(Concept::new(Uuid::from_u128(2), CollectionSummary::new(graph, "http://uri.example/1")));
///
/// let index = Arc::new(MemoryIndex::new());
/// let engine = SyncEngine::new(SyncConfig::default(), store, index.clone());
///
/// let report = engine
///     .sync_after_update(&AffectedNodes::concepts(graph, [Uuid::from_u128(2)]))
///     .await
///     .unwrap();
/// assert_eq!(report.indexed, 1);
/// assert_eq!(index.document_count("concepts"), 1);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct SyncEngine {
    config: SyncConfig,
    store: Arc<dyn TermedStore>,
    transport: Arc<dyn IndexTransport>,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, store: Arc<dyn TermedStore>, transport: Arc<dyn IndexTransport>) -> Self {
        Self {
            config,
            store,
            transport,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The plan [`SyncEngine::sync_after_update`] would follow for `nodes`.
    pub fn plan(&self, nodes: &AffectedNodes) -> ReindexPlan {
        decide(nodes, &self.config.thresholds)
    }

    fn writer(&self) -> IndexWriter<'_> {
        IndexWriter::new(self.transport.as_ref(), self.config.bulk_batch_size)
    }

    fn full_reindexer(&self) -> FullReindexer<'_> {
        FullReindexer::new(&self.config, self.store.as_ref(), self.transport.as_ref())
    }

    fn closure_expander(&self) -> ClosureExpander<'_> {
        ClosureExpander::new(
            self.store.as_ref(),
            self.transport.as_ref(),
            &self.config.concept_index.name,
        )
    }

    /// Bring the index up to date after collections or concepts were
    /// created or modified.
    ///
    /// Writes wait for the index to refresh, so the changes are searchable
    /// once this returns.
    pub async fn sync_after_update(&self, nodes: &AffectedNodes) -> Result<SyncReport> {
        let plan = self.plan(nodes);
        info!("sync after update of {}: {plan:?}", nodes.graph_id);

        let report = match plan {
            ReindexPlan::Full { graph_id, concept_ids } => {
                let mut report = self.full_reindexer().run(true).await?;
                self.remove_missing(graph_id, &concept_ids, &mut report).await?;
                report
            }
            ReindexPlan::Collections {
                concept_collections,
                collection_documents,
                graph_id,
                concept_ids,
            } => {
                let mut report = self
                    .reindex_collections(&concept_collections, &collection_documents)
                    .await?;
                self.remove_missing(graph_id, &concept_ids, &mut report).await?;
                report
            }
            ReindexPlan::Incremental { graph_id, concept_ids } => {
                let closure = self.closure_expander().expand(graph_id, &concept_ids).await?;
                let deletes: Vec<Uuid> = closure.missing.iter().copied().collect();
                let mut report = SyncReport::new(Strategy::Incremental);
                self.writer()
                    .write_concept_changes(
                        &self.config.concept_index.name,
                        graph_id,
                        &closure.into_concepts(),
                        &deletes,
                        true,
                        &mut report,
                    )
                    .await?;
                report
            }
        };

        log_report(&report);
        Ok(report)
    }

    async fn reindex_collections(
        &self,
        concept_collections: &BTreeSet<Uuid>,
        collection_documents: &BTreeSet<Uuid>,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::new(Strategy::Collections);

        if !collection_documents.is_empty() {
            let mut collections = Vec::new();
            let mut removed = Vec::new();
            for id in collection_documents {
                match self.store.collection(*id).await? {
                    Some(collection) => collections.push(collection),
                    None => removed.push(*id),
                }
            }
            self.writer()
                .write_collections(
                    &self.config.collection_index.name,
                    &collections,
                    &removed,
                    true,
                    &mut report,
                )
                .await?;
        }

        let ids: Vec<Uuid> = concept_collections.iter().copied().collect();
        let concepts = self.full_reindexer().run_for(&ids, false, true).await?;
        report.absorb(concepts);
        Ok(report)
    }

    /// Delete the documents of touched concepts the store no longer has.
    async fn remove_missing(
        &self,
        graph_id: Uuid,
        concept_ids: &BTreeSet<Uuid>,
        report: &mut SyncReport,
    ) -> Result<()> {
        if concept_ids.is_empty() {
            return Ok(());
        }
        let requested: Vec<Uuid> = concept_ids.iter().copied().collect();
        let present: BTreeSet<Uuid> = self
            .store
            .concepts(graph_id, &requested)
            .await?
            .into_iter()
            .map(|concept| concept.id)
            .collect();
        let missing: Vec<Uuid> = requested.into_iter().filter(|id| !present.contains(id)).collect();
        if !missing.is_empty() {
            info!("removing {} concepts of {graph_id} missing from the store", missing.len());
        }
        self.writer()
            .write_concept_changes(&self.config.concept_index.name, graph_id, &[], &missing, true, report)
            .await
    }

    /// Bring the index up to date after collections or concepts were removed
    /// from the store.
    ///
    /// With `collection_affected` set, the listed collections are removed
    /// together with every concept of `graph_id`. Otherwise the listed
    /// concepts are removed and their former neighbors rewritten.
    pub async fn sync_after_delete(&self, nodes: &AffectedNodes) -> Result<SyncReport> {
        let concept_index = &self.config.concept_index.name;
        let writer = self.writer();

        let report = if nodes.collection_affected {
            info!(
                "removing collections {:?} and the concepts of {}",
                nodes.collection_ids, nodes.graph_id
            );
            let mut report = SyncReport::new(Strategy::CascadeDelete);
            writer
                .delete_matching(
                    concept_index,
                    &DeleteQuery::matching("vocabulary.id", nodes.graph_id),
                    &mut report,
                )
                .await?;
            for id in &nodes.collection_ids {
                writer
                    .delete_matching(
                        &self.config.collection_index.name,
                        &DeleteQuery::matching("id", id),
                        &mut report,
                    )
                    .await?;
            }
            report
        } else {
            info!("removing {} concepts of {}", nodes.concept_ids.len(), nodes.graph_id);
            let closure = self
                .closure_expander()
                .expand_for_delete(nodes.graph_id, &nodes.concept_ids)
                .await?;
            let deletes: Vec<Uuid> = closure.missing.iter().copied().collect();
            let mut report = SyncReport::new(Strategy::ConceptDelete);
            writer
                .write_concept_changes(
                    concept_index,
                    nodes.graph_id,
                    &closure.neighbors,
                    &deletes,
                    true,
                    &mut report,
                )
                .await?;
            report
        };

        log_report(&report);
        Ok(report)
    }

    /// Prepare the indices when the service starts.
    ///
    /// Drops both indices first if `delete_indices_on_start` is set. Any
    /// index that does not exist is created with its settings and mapping.
    /// If an index was created, or `full_reindex_on_start` is set, the store
    /// is then reindexed in full.
    pub async fn bootstrap(&self) -> Result<BootstrapReport> {
        let mut report = BootstrapReport::default();

        let indices = [
            (&self.config.concept_index, IndexRole::Concepts),
            (&self.config.collection_index, IndexRole::Collections),
        ];

        if self.config.delete_indices_on_start {
            for (index, _) in &indices {
                if self.transport.delete_index(&index.name).await? {
                    info!("deleted index {}", index.name);
                    report.deleted.push(index.name.clone());
                } else {
                    info!("index {} was not deleted", index.name);
                }
            }
        }

        for (index, role) in &indices {
            if self.transport.index_exists(&index.name).await? {
                continue;
            }
            if self.create_index(index, *role).await? {
                info!("created index {}", index.name);
                report.created.push(index.name.clone());
            } else {
                warn!("could not create index {}", index.name);
                report.failed.push(index.name.clone());
            }
        }

        if !report.created.is_empty() || self.config.full_reindex_on_start {
            info!("running full reindex");
            let reindex = self.full_reindexer().run(false).await?;
            log_report(&reindex);
            report.reindex = Some(reindex);
        }

        Ok(report)
    }

    async fn create_index(&self, index: &IndexConfig, role: IndexRole) -> Result<bool> {
        let settings = index.settings_body(role)?;
        let mappings = index.mappings_body(role)?;
        if !self.transport.create_index(&index.name, &settings).await? {
            return Ok(false);
        }
        self.transport.put_mapping(&index.name, &mappings).await
    }

    /// Empty both indices and rebuild them from the store.
    pub async fn reindex_all(&self) -> Result<SyncReport> {
        let mut wipe = SyncReport::new(Strategy::Full);
        let writer = self.writer();
        for index in [&self.config.collection_index.name, &self.config.concept_index.name] {
            writer.delete_matching(index, &DeleteQuery::MatchAll, &mut wipe).await?;
        }

        let mut report = self.full_reindexer().run(true).await?;
        report.absorb(wipe);
        log_report(&report);
        Ok(report)
    }

    /// Run a raw query against `index`, the concept index by default.
    ///
    /// A failing query is logged; its error body is returned as is, or
    /// `Value::Null` if the body is not JSON.
    pub async fn search(&self, index: Option<&str>, query: &[u8]) -> Result<Value> {
        let index = index.unwrap_or(&self.config.concept_index.name);
        let outcome = self.transport.search(index, query).await?;
        if !outcome.success() {
            warn!("search on {index} failed with status {}: {}", outcome.status, outcome.body);
        }
        Ok(outcome.json().unwrap_or(Value::Null))
    }
}

fn log_report(report: &SyncReport) {
    if report.is_clean() {
        info!(
            "{:?} sync done: {} indexed, {} deleted",
            report.strategy, report.indexed, report.deleted
        );
    } else {
        warn!(
            "{:?} sync done with {} failed operations: {} indexed, {} deleted",
            report.strategy,
            report.failures.len(),
            report.indexed,
            report.deleted
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Collection, CollectionSummary, Concept};
    use crate::store::memory::MemoryTermedStore;
    use crate::transport::memory::MemoryIndex;

    const GRAPH: Uuid = Uuid::from_u128(1000);

    fn summary() -> CollectionSummary {
        CollectionSummary::new(GRAPH, "http://uri.example/terminology/1")
    }

    fn engine(store: Arc<MemoryTermedStore>, index: Arc<MemoryIndex>) -> SyncEngine {
        SyncEngine::new(SyncConfig::default(), store, index)
    }

    #[tokio::test]
    async fn test_search_failure_returns_error_body() {
        let index = Arc::new(MemoryIndex::new());
        let engine = engine(Arc::new(MemoryTermedStore::new()), index);
        let result = engine.search(None, br#"{"query":{"match_all":{}}}"#).await.unwrap();
        assert_eq!(result["status"], 404);
        assert_eq!(result["error"]["type"], "index_not_found_exception");
    }

    #[tokio::test]
    async fn test_bootstrap_creates_and_fills() {
        let store = Arc::new(MemoryTermedStore::new());
        store.put_collection(Collection::new(summary()));
        store.put_concept(Concept::new(Uuid::from_u128(1), summary()));
        let index = Arc::new(MemoryIndex::new());

        let report = engine(store, index.clone()).bootstrap().await.unwrap();

        assert_eq!(report.created, vec!["concepts".to_string(), "vocabularies".to_string()]);
        assert!(report.failed.is_empty());
        assert_eq!(report.reindex.map(|r| r.indexed), Some(2));
        assert!(index.mapping("concepts").is_some());
        assert_eq!(index.document_count("concepts"), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_with_existing_indices_is_quiet() {
        let store = Arc::new(MemoryTermedStore::new());
        let index = Arc::new(MemoryIndex::new());
        let engine = engine(store, index.clone());
        engine.bootstrap().await.unwrap();
        index.clear_requests();

        let report = engine.bootstrap().await.unwrap();

        assert!(report.created.is_empty());
        assert!(report.reindex.is_none());
        assert!(index.requests().iter().all(|r| r.operation == "exists"));
    }

    #[tokio::test]
    async fn test_plan_follows_thresholds() {
        let engine = engine(Arc::new(MemoryTermedStore::new()), Arc::new(MemoryIndex::new()));
        let nodes = AffectedNodes::collections(GRAPH, (0..30).map(Uuid::from_u128));
        assert_eq!(engine.plan(&nodes).strategy(), Strategy::Full);
    }

    #[tokio::test]
    async fn test_concurrent_calls_for_different_collections() {
        let other = Uuid::from_u128(2000);
        let store = Arc::new(MemoryTermedStore::new());
        store.put_concept(Concept::new(Uuid::from_u128(1), summary()));
        store.put_concept(Concept::new(
            Uuid::from_u128(2),
            CollectionSummary::new(other, "http://uri.example/terminology/2"),
        ));
        let index = Arc::new(MemoryIndex::new());
        let engine = engine(store, index.clone());

        let first = AffectedNodes::concepts(GRAPH, [Uuid::from_u128(1)]);
        let second = AffectedNodes::concepts(other, [Uuid::from_u128(2)]);
        let (a, b) = tokio::join!(engine.sync_after_update(&first), engine.sync_after_update(&second));

        assert_eq!(a.unwrap().indexed + b.unwrap().indexed, 2);
        assert_eq!(index.document_count("concepts"), 2);
    }
}
