//! One-hop closure of a set of touched concepts.
//!
//! Index documents of a concept embed data of its direct neighbors, so a
//! change to one concept makes the documents of its neighbors stale too. The
//! neighbors are taken from two snapshots:
//!
//! - *after*: the current store records of the touched concepts
//! - *before*: the documents the index still holds for them
//!
//! Using both catches neighbors that were attached by the edit as well as
//! ones that were detached by it.

use std::collections::BTreeSet;

use ahash::AHashSet;
use log::debug;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Concept, form_document_id};
use crate::store::TermedStore;
use crate::transport::IndexTransport;

/// The concepts whose documents must be rewritten after an edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Closure {
    /// Current records of the touched concepts that still exist.
    pub updated: Vec<Concept>,

    /// Current records of their direct neighbors, before or after the edit.
    pub neighbors: Vec<Concept>,

    /// Touched concepts the store no longer has; their documents go.
    pub missing: BTreeSet<Uuid>,
}

impl Closure {
    /// Every concept to upsert, touched ones first.
    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.updated.iter().chain(self.neighbors.iter())
    }

    pub fn into_concepts(self) -> Vec<Concept> {
        let mut concepts = self.updated;
        concepts.extend(self.neighbors);
        concepts
    }

    /// Ids of the concepts to upsert.
    pub fn ids(&self) -> BTreeSet<Uuid> {
        self.concepts().map(|concept| concept.id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.neighbors.is_empty() && self.missing.is_empty()
    }
}

/// Computes [`Closure`]s from the store and the concept index.
#[derive(Debug, Clone, Copy)]
pub struct ClosureExpander<'a> {
    store: &'a dyn TermedStore,
    transport: &'a dyn IndexTransport,
    concept_index: &'a str,
}

impl<'a> ClosureExpander<'a> {
    pub fn new(store: &'a dyn TermedStore, transport: &'a dyn IndexTransport, concept_index: &'a str) -> Self {
        Self {
            store,
            transport,
            concept_index,
        }
    }

    /// Closure of concepts that were created or modified.
    ///
    /// Touched ids the store does not know end up in [`Closure::missing`].
    pub async fn expand(&self, graph_id: Uuid, ids: &BTreeSet<Uuid>) -> Result<Closure> {
        if ids.is_empty() {
            return Ok(Closure::default());
        }

        let requested: Vec<Uuid> = ids.iter().copied().collect();
        let updated = self.store.concepts(graph_id, &requested).await?;
        let before = self.indexed(graph_id, ids).await?;

        let present: AHashSet<Uuid> = updated.iter().map(|concept| concept.id).collect();
        let missing: BTreeSet<Uuid> = ids.iter().filter(|id| !present.contains(id)).copied().collect();

        let neighbor_ids = neighbors_of(updated.iter().chain(before.iter()), ids);
        let neighbors = self.store.concepts(graph_id, &neighbor_ids).await?;
        debug!(
            "closure of {} concepts in {graph_id}: {} updated, {} neighbors, {} missing",
            ids.len(),
            updated.len(),
            neighbors.len(),
            missing.len()
        );

        Ok(Closure {
            updated,
            neighbors,
            missing,
        })
    }

    /// Closure of concepts that were removed from the store.
    ///
    /// The removed concepts can only be seen in the index, so their neighbors
    /// come from the *before* snapshot alone. A concept the index never held
    /// contributes no neighbors.
    pub async fn expand_for_delete(&self, graph_id: Uuid, deleted: &BTreeSet<Uuid>) -> Result<Closure> {
        if deleted.is_empty() {
            return Ok(Closure::default());
        }

        let before = self.indexed(graph_id, deleted).await?;
        let neighbor_ids = neighbors_of(before.iter(), deleted);
        let neighbors = self.store.concepts(graph_id, &neighbor_ids).await?;
        debug!(
            "delete closure of {} concepts in {graph_id}: {} neighbors",
            deleted.len(),
            neighbors.len()
        );

        Ok(Closure {
            updated: Vec::new(),
            neighbors,
            missing: deleted.clone(),
        })
    }

    /// Documents the concept index currently holds for `ids`.
    ///
    /// An index that cannot answer is read as holding nothing.
    async fn indexed(&self, graph_id: Uuid, ids: &BTreeSet<Uuid>) -> Result<Vec<Concept>> {
        let document_ids: Vec<String> = ids.iter().map(|id| form_document_id(graph_id, *id)).collect();
        let query = json!({
            "query": { "ids": { "values": document_ids } },
            "size": document_ids.len(),
        });

        let outcome = self
            .transport
            .search(self.concept_index, query.to_string().as_bytes())
            .await?;
        if !outcome.success() {
            debug!(
                "no previous documents from {} (status {}), assuming none",
                self.concept_index, outcome.status
            );
            return Ok(Vec::new());
        }

        let hits = outcome
            .json()
            .and_then(|body| body.pointer("/hits/hits").and_then(Value::as_array).cloned())
            .unwrap_or_default();

        Ok(hits
            .into_iter()
            .filter_map(|mut hit| hit.get_mut("_source").map(Value::take))
            .filter_map(|source| match Concept::from_index_value(source) {
                Ok(concept) => Some(concept),
                Err(err) => {
                    debug!("skipping unreadable concept document: {err}");
                    None
                }
            })
            .filter(|concept| concept.collection_id() == graph_id && ids.contains(&concept.id))
            .collect())
    }
}

/// Sorted, de-duplicated neighbors of `concepts`, leaving out `exclude`.
fn neighbors_of<'c, I>(concepts: I, exclude: &BTreeSet<Uuid>) -> Vec<Uuid>
where
    I: Iterator<Item = &'c Concept>,
{
    let mut seen = AHashSet::new();
    let mut ids: Vec<Uuid> = concepts
        .flat_map(Concept::neighbor_ids)
        .filter(|id| !exclude.contains(id) && seen.insert(*id))
        .collect();
    ids.sort();
    ids
}
