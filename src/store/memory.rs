//! In-memory authoritative store.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TermSyncError};
use crate::model::{Collection, Concept};
use crate::store::TermedStore;

/// On-disk form of a store: every collection and every concept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub collections: Vec<Collection>,

    #[serde(default)]
    pub concepts: Vec<Concept>,
}

#[derive(Debug, Default)]
struct State {
    collections: BTreeMap<Uuid, Collection>,
    /// collection id -> concept id -> concept
    concepts: BTreeMap<Uuid, BTreeMap<Uuid, Concept>>,
}

/// A [`TermedStore`] holding its records in memory.
#[derive(Debug, Default)]
pub struct MemoryTermedStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl MemoryTermedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        for collection in snapshot.collections {
            store.put_collection(collection);
        }
        for concept in snapshot.concepts {
            store.put_concept(concept);
        }
        store
    }

    /// Load a snapshot file (`{"collections": [...], "concepts": [...]}`).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TermSyncError::store(format!("cannot read snapshot {}: {e}", path.display()))
        })?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Insert or replace a collection.
    pub fn put_collection(&self, collection: Collection) {
        let mut state = self.state.write();
        state.concepts.entry(collection.id()).or_default();
        state.collections.insert(collection.id(), collection);
    }

    /// Insert or replace a concept.
    pub fn put_concept(&self, concept: Concept) {
        self.state
            .write()
            .concepts
            .entry(concept.collection_id())
            .or_default()
            .insert(concept.id, concept);
    }

    /// Remove a concept and strip references to it from the rest of its collection.
    pub fn remove_concept(&self, collection_id: Uuid, concept_id: Uuid) -> Option<Concept> {
        let mut state = self.state.write();
        let concepts = state.concepts.get_mut(&collection_id)?;
        let removed = concepts.remove(&concept_id)?;
        for concept in concepts.values_mut() {
            concept.broader.retain(|id| *id != concept_id);
            concept.narrower.retain(|id| *id != concept_id);
        }
        Some(removed)
    }

    /// Remove a collection together with all of its concepts.
    pub fn remove_collection(&self, collection_id: Uuid) -> Option<Collection> {
        let mut state = self.state.write();
        state.concepts.remove(&collection_id);
        state.collections.remove(&collection_id)
    }

    /// Make every read fail, to exercise store fault handling.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Current content as a snapshot.
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        StoreSnapshot {
            collections: state.collections.values().cloned().collect(),
            concepts: state
                .concepts
                .values()
                .flat_map(|concepts| concepts.values().cloned())
                .collect(),
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(TermSyncError::store("store is unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TermedStore for MemoryTermedStore {
    async fn collection_ids(&self) -> Result<Vec<Uuid>> {
        self.check_available()?;
        Ok(self.state.read().collections.keys().copied().collect())
    }

    async fn collection(&self, id: Uuid) -> Result<Option<Collection>> {
        self.check_available()?;
        Ok(self.state.read().collections.get(&id).cloned())
    }

    async fn concepts(&self, collection_id: Uuid, ids: &[Uuid]) -> Result<Vec<Concept>> {
        self.check_available()?;
        let state = self.state.read();
        let Some(concepts) = state.concepts.get(&collection_id) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| concepts.get(id).cloned()).collect())
    }

    async fn all_concepts(&self, collection_id: Uuid) -> Result<Vec<Concept>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .concepts
            .get(&collection_id)
            .map(|concepts| concepts.values().cloned().collect())
            .unwrap_or_default())
    }
}
