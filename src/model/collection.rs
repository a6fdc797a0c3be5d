//! Collection (vocabulary / terminology) records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::model::Localized;

/// Identity and label fields of a collection.
///
/// Embedded in every concept document under `vocabulary`, so concepts can be
/// found (and cascade-deleted) by the collection they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: Uuid,

    #[serde(default)]
    pub uri: String,

    #[serde(default, skip_serializing_if = "Localized::is_empty")]
    pub label: Localized,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
}

impl CollectionSummary {
    /// Create a summary with only an id and a uri.
    pub fn new<S: Into<String>>(id: Uuid, uri: S) -> Self {
        Self {
            id,
            uri: uri.into(),
            label: Localized::new(),
            status: String::new(),
        }
    }

    /// Add a label value in the given language.
    pub fn with_label<L: Into<String>, V: Into<String>>(mut self, lang: L, value: V) -> Self {
        self.label.entry(lang.into()).or_default().push(value.into());
        self
    }

    /// Set the status.
    pub fn with_status<S: Into<String>>(mut self, status: S) -> Self {
        self.status = status.into();
        self
    }
}

/// A complete collection record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(flatten)]
    pub summary: CollectionSummary,

    #[serde(default, skip_serializing_if = "Localized::is_empty")]
    pub description: Localized,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<String>,
}

impl Collection {
    pub fn new(summary: CollectionSummary) -> Self {
        Self {
            summary,
            description: Localized::new(),
            modified: None,
            languages: Vec::new(),
            domains: Vec::new(),
            contributors: Vec::new(),
        }
    }

    /// The collection id, which is also its document id.
    pub fn id(&self) -> Uuid {
        self.summary.id
    }

    /// Id of the collection's document in the collection index.
    pub fn document_id(&self) -> String {
        self.summary.id.to_string()
    }

    /// Set the last-modified timestamp.
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Add a language the collection is maintained in.
    pub fn with_language<S: Into<String>>(mut self, lang: S) -> Self {
        self.languages.push(lang.into());
        self
    }

    /// Serialize into the collection index schema.
    pub fn to_index_document(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a collection document read back from the index.
    pub fn from_index_document(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn test_document_omits_empty_fields() {
        let id = Uuid::from_u128(7);
        let collection = Collection::new(CollectionSummary::new(id, "http://uri.example/terminology/7"));

        let doc: Value = serde_json::from_slice(&collection.to_index_document().unwrap()).unwrap();
        assert_eq!(
            doc,
            json!({"id": id.to_string(), "uri": "http://uri.example/terminology/7"})
        );
        assert_eq!(collection.document_id(), id.to_string());
    }

    #[test]
    fn test_document_flattens_summary() {
        let id = Uuid::from_u128(8);
        let modified = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let collection = Collection::new(
            CollectionSummary::new(id, "http://uri.example/terminology/8")
                .with_label("fi", "Sanasto")
                .with_label("en", "Vocabulary")
                .with_status("VALID"),
        )
        .with_modified(modified)
        .with_language("fi");

        let bytes = collection.to_index_document().unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["label"]["fi"], json!(["Sanasto"]));
        assert_eq!(doc["status"], "VALID");
        assert_eq!(doc["languages"], json!(["fi"]));
        assert!(doc.get("summary").is_none());

        let parsed = Collection::from_index_document(&bytes).unwrap();
        assert_eq!(parsed, collection);
    }
}
