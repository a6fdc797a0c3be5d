//! The change notification produced by one edit.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which collection and concept ids one edit transaction touched.
///
/// Built by the edit-receiving layer once per transaction and handed by value
/// to the synchronization engine, which consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedNodes {
    /// The collection the edit happened in.
    pub graph_id: Uuid,

    /// Collection-level data changed, or the set of collections itself did.
    #[serde(default)]
    pub collection_affected: bool,

    /// Collections whose own documents need reindexing.
    #[serde(default)]
    pub collection_ids: BTreeSet<Uuid>,

    /// Concepts created, updated or about to be deleted.
    #[serde(default)]
    pub concept_ids: BTreeSet<Uuid>,
}

impl AffectedNodes {
    /// An edit that touched only concepts of `graph_id`.
    pub fn concepts<I: IntoIterator<Item = Uuid>>(graph_id: Uuid, ids: I) -> Self {
        Self {
            graph_id,
            collection_affected: false,
            collection_ids: BTreeSet::new(),
            concept_ids: ids.into_iter().collect(),
        }
    }

    /// An edit that changed collection-level data of the given collections.
    pub fn collections<I: IntoIterator<Item = Uuid>>(graph_id: Uuid, ids: I) -> Self {
        Self {
            graph_id,
            collection_affected: true,
            collection_ids: ids.into_iter().collect(),
            concept_ids: BTreeSet::new(),
        }
    }

    /// Add concept ids to the descriptor.
    pub fn with_concepts<I: IntoIterator<Item = Uuid>>(mut self, ids: I) -> Self {
        self.concept_ids.extend(ids);
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.collection_affected && self.concept_ids.is_empty()
    }
}
