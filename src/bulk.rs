//! Rendering of the index store's line-delimited bulk protocol.
//!
//! Every upsert is an action line followed by the document body, every
//! delete a single action line:
//!
//! ```text
//! {"index":{"_index":"concepts","_id":"<collection>/<concept>"}}
//! {"id":"<concept>","vocabulary":{...},...}
//! {"delete":{"_index":"concepts","_id":"<collection>/<concept>"}}
//! ```
//!
//! Rendering is pure and order-stable: lines come out in the order the
//! operations were added.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, TermSyncError};
use crate::model::{Collection, Concept, form_document_id};

/// Action line of one bulk operation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Action<'a> {
    Index(ActionMeta<'a>),
    Delete(ActionMeta<'a>),
}

#[derive(Debug, Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_id")]
    id: &'a str,
}

/// Accumulates bulk operations against one index.
#[derive(Debug, Clone)]
pub struct BulkRequestBuilder {
    index: String,
    payload: Vec<u8>,
    upserts: usize,
    deletes: usize,
}

impl BulkRequestBuilder {
    pub fn new<S: Into<String>>(index: S) -> Self {
        Self {
            index: index.into(),
            payload: Vec::new(),
            upserts: 0,
            deletes: 0,
        }
    }

    /// Target index name.
    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Add an upsert of a pre-rendered JSON body.
    ///
    /// The body must be a single-line JSON document.
    pub fn index(&mut self, document_id: &str, body: &[u8]) -> Result<&mut Self> {
        let meta = ActionMeta {
            index: &self.index,
            id: document_id,
        };
        let header = serde_json::to_vec(&Action::Index(meta))?;
        self.push_line(&header);
        self.push_line(body);
        self.upserts += 1;
        Ok(self)
    }

    /// Add an upsert of a concept document.
    pub fn index_concept(&mut self, concept: &Concept) -> Result<&mut Self> {
        let body = concept.to_index_document()?;
        self.index(&concept.document_id(), &body)
    }

    /// Add an upsert of a collection document.
    pub fn index_collection(&mut self, collection: &Collection) -> Result<&mut Self> {
        let body = collection.to_index_document()?;
        self.index(&collection.document_id(), &body)
    }

    /// Add a delete by document id.
    pub fn delete(&mut self, document_id: &str) -> Result<&mut Self> {
        let meta = ActionMeta {
            index: &self.index,
            id: document_id,
        };
        let header = serde_json::to_vec(&Action::Delete(meta))?;
        self.push_line(&header);
        self.deletes += 1;
        Ok(self)
    }

    /// Add a delete of a concept document.
    pub fn delete_concept(&mut self, collection_id: Uuid, concept_id: Uuid) -> Result<&mut Self> {
        self.delete(&form_document_id(collection_id, concept_id))
    }

    /// Number of upserts added so far.
    pub fn upserts(&self) -> usize {
        self.upserts
    }

    /// Number of deletes added so far.
    pub fn deletes(&self) -> usize {
        self.deletes
    }

    /// Number of operations added so far.
    pub fn len(&self) -> usize {
        self.upserts + self.deletes
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The rendered payload, newline terminated.
    pub fn build(self) -> Vec<u8> {
        self.payload
    }

    fn push_line(&mut self, line: &[u8]) {
        self.payload.extend_from_slice(line);
        self.payload.push(b'\n');
    }
}

/// Render upserts of `concepts` followed by deletes of `deletes` in one payload.
///
/// The two sets must not share a document id; an upsert and a delete of the
/// same document in one request would leave the outcome to the store.
pub fn render_concepts(
    index: &str,
    concepts: &[Concept],
    collection_id: Uuid,
    deletes: &[Uuid],
) -> Result<BulkRequestBuilder> {
    let upsert_ids: HashSet<String> = concepts.iter().map(Concept::document_id).collect();
    if let Some(id) = deletes
        .iter()
        .map(|id| form_document_id(collection_id, *id))
        .find(|id| upsert_ids.contains(id))
    {
        return Err(TermSyncError::invalid_argument(format!(
            "document {id} is both upserted and deleted"
        )));
    }

    let mut builder = BulkRequestBuilder::new(index);
    for concept in concepts {
        builder.index_concept(concept)?;
    }
    for id in deletes {
        builder.delete_concept(collection_id, *id)?;
    }
    Ok(builder)
}

/// Split upserts of `concepts` into payloads of at most `batch_size` documents.
pub fn chunks(index: &str, concepts: &[Concept], batch_size: usize) -> Result<Vec<BulkRequestBuilder>> {
    let batch_size = batch_size.max(1);
    concepts
        .chunks(batch_size)
        .map(|chunk| {
            let mut builder = BulkRequestBuilder::new(index);
            for concept in chunk {
                builder.index_concept(concept)?;
            }
            Ok(builder)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::model::CollectionSummary;

    fn concept(id: u128) -> Concept {
        let summary = CollectionSummary::new(Uuid::from_u128(1), "http://uri.example/terminology/1");
        Concept::new(Uuid::from_u128(id), summary)
            .with_field("label", serde_json::json!({"en": [format!("concept {id}")]}))
    }

    fn lines(payload: &[u8]) -> Vec<Value> {
        std::str::from_utf8(payload)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_fixed_rendering() {
        let mut builder = BulkRequestBuilder::new("vocabularies");
        builder.index("v1", br#"{"id":"v1"}"#).unwrap().delete("v2").unwrap();
        assert_eq!(builder.len(), 2);

        let payload = String::from_utf8(builder.build()).unwrap();
        assert_eq!(
            payload,
            "{\"index\":{\"_index\":\"vocabularies\",\"_id\":\"v1\"}}\n\
             {\"id\":\"v1\"}\n\
             {\"delete\":{\"_index\":\"vocabularies\",\"_id\":\"v2\"}}\n"
        );
    }

    #[test]
    fn test_order_and_bodies_survive_rendering() {
        let concepts = vec![concept(3), concept(2), concept(5)];
        let deletes = vec![Uuid::from_u128(9), Uuid::from_u128(8)];
        let builder = render_concepts("concepts", &concepts, Uuid::from_u128(1), &deletes).unwrap();
        assert_eq!(builder.upserts(), 3);
        assert_eq!(builder.deletes(), 2);

        let lines = lines(&builder.build());
        assert_eq!(lines.len(), 3 * 2 + 2);

        for (i, original) in concepts.iter().enumerate() {
            assert_eq!(lines[2 * i]["index"]["_id"], original.document_id());
            let parsed = Concept::from_index_value(lines[2 * i + 1].clone()).unwrap();
            assert_eq!(&parsed, original);
        }
        assert_eq!(
            lines[6]["delete"]["_id"],
            form_document_id(Uuid::from_u128(1), Uuid::from_u128(9))
        );
        assert_eq!(
            lines[7]["delete"]["_id"],
            form_document_id(Uuid::from_u128(1), Uuid::from_u128(8))
        );
    }

    #[test]
    fn test_overlapping_ids_are_rejected() {
        let concepts = vec![concept(3)];
        let err = render_concepts("concepts", &concepts, Uuid::from_u128(1), &[Uuid::from_u128(3)])
            .unwrap_err();
        assert!(matches!(err, TermSyncError::InvalidArgument(_)));
    }

    #[test]
    fn test_headers_are_escaped() {
        let mut builder = BulkRequestBuilder::new("concepts");
        builder.delete("a\"b").unwrap();
        let lines = lines(&builder.build());
        assert_eq!(lines[0]["delete"]["_id"], "a\"b");
    }

    #[test]
    fn test_chunks() {
        let concepts: Vec<Concept> = (0..5).map(concept).collect();
        let batches = chunks("concepts", &concepts, 2).unwrap();
        let sizes: Vec<usize> = batches.iter().map(BulkRequestBuilder::upserts).collect();
        assert_eq!(sizes, vec![2, 2, 1]);

        assert!(chunks("concepts", &[], 2).unwrap().is_empty());
    }
}
