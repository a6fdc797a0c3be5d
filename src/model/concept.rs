//! Concept records and their index documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;
use crate::model::CollectionSummary;

/// Field names owned by the concept itself; the field bag cannot shadow them.
const RESERVED_FIELDS: [&str; 4] = ["id", "vocabulary", "broader", "narrower"];

/// Id of a concept's document in the concept index.
///
/// Pure function of the pair; hyphenated UUIDs are fixed-width and contain no
/// `/`, so distinct pairs never collide.
pub fn form_document_id(collection_id: Uuid, concept_id: Uuid) -> String {
    format!("{collection_id}/{concept_id}")
}

/// One entry of a collection.
///
/// `broader` and `narrower` hold plain ids. They may reference each other in
/// cycles; nothing here assumes the hierarchy is acyclic. Everything else
/// (labels, status, definitions...) travels in `fields` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: Uuid,

    /// The collection the concept belongs to.
    pub vocabulary: CollectionSummary,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub broader: Vec<Uuid>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub narrower: Vec<Uuid>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Concept {
    pub fn new(id: Uuid, vocabulary: CollectionSummary) -> Self {
        Self {
            id,
            vocabulary,
            broader: Vec::new(),
            narrower: Vec::new(),
            fields: Map::new(),
        }
    }

    /// Id of the owning collection.
    pub fn collection_id(&self) -> Uuid {
        self.vocabulary.id
    }

    pub fn document_id(&self) -> String {
        form_document_id(self.vocabulary.id, self.id)
    }

    pub fn with_broader(mut self, id: Uuid) -> Self {
        self.broader.push(id);
        self
    }

    pub fn with_narrower(mut self, id: Uuid) -> Self {
        self.narrower.push(id);
        self
    }

    /// Put a value into the field bag. Reserved names are ignored.
    pub fn with_field<S: Into<String>>(mut self, name: S, value: Value) -> Self {
        let name = name.into();
        if !RESERVED_FIELDS.contains(&name.as_str()) {
            self.fields.insert(name, value);
        }
        self
    }

    /// Ids of every concept this one links to, broader first.
    pub fn neighbor_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.broader.iter().chain(self.narrower.iter()).copied()
    }

    /// Serialize into the concept index schema.
    ///
    /// The field bag is written first and the concept's own fields on top,
    /// so a bag entry can never shadow `id`, `vocabulary` or the relations.
    /// Empty relation lists are left out.
    pub fn to_index_document(&self) -> Result<Vec<u8>> {
        let mut doc = self.fields.clone();
        doc.insert("id".to_string(), Value::String(self.id.to_string()));
        doc.insert("vocabulary".to_string(), serde_json::to_value(&self.vocabulary)?);
        for key in ["broader", "narrower"] {
            doc.remove(key);
        }
        if !self.broader.is_empty() {
            doc.insert("broader".to_string(), serde_json::to_value(&self.broader)?);
        }
        if !self.narrower.is_empty() {
            doc.insert("narrower".to_string(), serde_json::to_value(&self.narrower)?);
        }
        Ok(serde_json::to_vec(&Value::Object(doc))?)
    }

    /// Parse a concept document read back from the index.
    ///
    /// Only the id, the owning collection and the relations must be present;
    /// any other field ends up in the field bag.
    pub fn from_index_document(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Like [`Concept::from_index_document`], for an already parsed `_source`.
    pub fn from_index_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;

    fn summary() -> CollectionSummary {
        CollectionSummary::new(Uuid::from_u128(100), "http://uri.example/terminology/100")
    }

    #[test]
    fn test_document_id_is_deterministic_and_injective() {
        let collections = [Uuid::from_u128(1), Uuid::from_u128(2)];
        let concepts = [Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)];

        let mut seen = HashSet::new();
        for c in collections {
            for k in concepts {
                let id = form_document_id(c, k);
                assert_eq!(id, form_document_id(c, k));
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_document_omits_empty_relations() {
        let concept = Concept::new(Uuid::from_u128(1), summary());
        let doc: Value = serde_json::from_slice(&concept.to_index_document().unwrap()).unwrap();

        assert!(doc.get("broader").is_none());
        assert!(doc.get("narrower").is_none());
        assert_eq!(doc["id"], Uuid::from_u128(1).to_string());
        assert_eq!(doc["vocabulary"]["id"], Uuid::from_u128(100).to_string());
    }

    #[test]
    fn test_document_round_trip_keeps_field_bag() {
        let concept = Concept::new(Uuid::from_u128(1), summary())
            .with_broader(Uuid::from_u128(2))
            .with_narrower(Uuid::from_u128(3))
            .with_narrower(Uuid::from_u128(4))
            .with_field("label", json!({"fi": ["kissa"], "en": ["cat"]}))
            .with_field("status", json!("DRAFT"));

        let bytes = concept.to_index_document().unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["broader"], json!([Uuid::from_u128(2).to_string()]));
        assert_eq!(doc["status"], "DRAFT");

        let parsed = Concept::from_index_document(&bytes).unwrap();
        assert_eq!(parsed, concept);
    }

    #[test]
    fn test_field_bag_cannot_shadow_identity() {
        let mut concept = Concept::new(Uuid::from_u128(1), summary()).with_field("id", json!("bogus"));
        assert!(concept.fields.is_empty());

        concept.fields.insert("narrower".to_string(), json!(["not-a-uuid"]));
        let doc: Value = serde_json::from_slice(&concept.to_index_document().unwrap()).unwrap();
        assert!(doc.get("narrower").is_none());
        assert_eq!(doc["id"], Uuid::from_u128(1).to_string());
    }

    #[test]
    fn test_neighbors_tolerate_cycles() {
        let id = Uuid::from_u128(1);
        let concept = Concept::new(id, summary()).with_broader(id).with_narrower(id);
        assert_eq!(concept.neighbor_ids().collect::<Vec<_>>(), vec![id, id]);
    }

    #[test]
    fn test_sparse_index_document_parses() {
        let raw = json!({
            "id": Uuid::from_u128(5).to_string(),
            "vocabulary": {"id": Uuid::from_u128(100).to_string()},
            "narrower": [Uuid::from_u128(6).to_string()]
        });
        let concept = Concept::from_index_value(raw).unwrap();
        assert_eq!(concept.narrower, vec![Uuid::from_u128(6)]);
        assert!(concept.broader.is_empty());
        assert_eq!(concept.vocabulary.uri, "");
    }
}
