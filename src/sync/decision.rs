//! Choosing how much of the index to rebuild.

use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::config::ReindexThresholds;
use crate::model::AffectedNodes;
use crate::sync::report::Strategy;

/// What to rebuild after one edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ReindexPlan {
    /// Every collection and every concept. Touched concepts the store no
    /// longer has are deleted afterwards.
    Full {
        graph_id: Uuid,
        concept_ids: BTreeSet<Uuid>,
    },

    /// Every concept of some collections, plus some collection documents.
    /// Touched concepts the store no longer has are deleted afterwards.
    Collections {
        concept_collections: BTreeSet<Uuid>,
        collection_documents: BTreeSet<Uuid>,
        graph_id: Uuid,
        concept_ids: BTreeSet<Uuid>,
    },

    /// The one-hop closure of the touched concepts.
    Incremental {
        graph_id: Uuid,
        concept_ids: BTreeSet<Uuid>,
    },
}

impl ReindexPlan {
    pub fn strategy(&self) -> Strategy {
        match self {
            ReindexPlan::Full { .. } => Strategy::Full,
            ReindexPlan::Collections { .. } => Strategy::Collections,
            ReindexPlan::Incremental { .. } => Strategy::Incremental,
        }
    }
}

/// Pick a plan for `nodes`. Pure; no I/O.
///
/// In priority order:
/// 1. more than `thresholds.collections` collections changed: rebuild everything
/// 2. a collection changed, or more than `thresholds.concepts` concepts did:
///    rebuild the concepts of the collections involved
/// 3. otherwise: incremental update of the touched concepts and their neighbors
pub fn decide(nodes: &AffectedNodes, thresholds: &ReindexThresholds) -> ReindexPlan {
    if nodes.collection_affected && nodes.collection_ids.len() > thresholds.collections {
        return ReindexPlan::Full {
            graph_id: nodes.graph_id,
            concept_ids: nodes.concept_ids.clone(),
        };
    }

    if nodes.collection_affected || nodes.concept_ids.len() > thresholds.concepts {
        let mut concept_collections = BTreeSet::from([nodes.graph_id]);
        let collection_documents = if nodes.collection_affected {
            concept_collections.extend(nodes.collection_ids.iter().copied());
            nodes.collection_ids.clone()
        } else {
            BTreeSet::new()
        };
        return ReindexPlan::Collections {
            concept_collections,
            collection_documents,
            graph_id: nodes.graph_id,
            concept_ids: nodes.concept_ids.clone(),
        };
    }

    ReindexPlan::Incremental {
        graph_id: nodes.graph_id,
        concept_ids: nodes.concept_ids.clone(),
    }
}
