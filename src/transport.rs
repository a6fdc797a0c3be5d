//! Talking to the index store.
//!
//! [`IndexTransport`] is the full surface the engine needs: index lifecycle,
//! bulk mutation, delete-by-query and free-form search. Two implementations
//! ship with the crate:
//!
//! - [`http::HttpIndexClient`]: the real thing, over HTTP with reqwest
//! - [`memory::MemoryIndex`]: an in-process store speaking the same protocol
//!
//! Outcomes are classified by status code only. Anything in 200..400 is a
//! success. Any other status is a store-level failure, reported as `false` or
//! as an unsuccessful [`Outcome`], never as an error. `Err` is reserved for
//! network faults (connection refused, timeout, unreadable response).

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::Result;

pub mod http;
pub mod memory;

/// Whether a status code counts as success.
pub fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}

/// Status and raw body of one store response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: u16,
    pub body: String,
}

impl Outcome {
    pub fn new<S: Into<String>>(status: u16, body: S) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn success(&self) -> bool {
        is_success(self.status)
    }

    /// The body parsed as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// Number of items a bulk response reports as failed.
    ///
    /// The store answers a bulk request with 200 even when single items fail;
    /// those are only visible in the `items` array.
    pub fn bulk_item_errors(&self) -> usize {
        let Some(body) = self.json() else {
            return 0;
        };
        if body.get("errors").and_then(Value::as_bool) != Some(true) {
            return 0;
        }
        body.get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| {
                        item.as_object()
                            .and_then(|actions| actions.values().next())
                            .is_some_and(|result| result.get("error").is_some())
                    })
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Selection of documents for delete-by-query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteQuery {
    /// Documents whose `field` (a dotted path, e.g. `vocabulary.id`) matches `value`.
    Match { field: String, value: String },

    /// Every document.
    MatchAll,
}

impl DeleteQuery {
    pub fn matching<F: Into<String>, V: ToString>(field: F, value: V) -> Self {
        DeleteQuery::Match {
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Request body, e.g. `{"query":{"match":{"id":"..."}}}`.
    pub fn to_body(&self) -> Vec<u8> {
        let body = match self {
            DeleteQuery::Match { field, value } => {
                let mut matcher = serde_json::Map::new();
                matcher.insert(field.clone(), Value::String(value.clone()));
                json!({ "query": { "match": matcher } })
            }
            DeleteQuery::MatchAll => json!({ "query": { "match_all": {} } }),
        };
        body.to_string().into_bytes()
    }
}

/// Operations against the remote index store.
#[async_trait]
pub trait IndexTransport: Send + Sync + std::fmt::Debug {
    /// `HEAD /{index}`. Only a 404 means the index is missing.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// `PUT /{index}` with the index settings. Creating an existing index fails
    /// with `false`.
    async fn create_index(&self, index: &str, settings: &[u8]) -> Result<bool>;

    /// `DELETE /{index}`.
    async fn delete_index(&self, index: &str) -> Result<bool>;

    /// `PUT /{index}/_mappings`.
    async fn put_mapping(&self, index: &str, mapping: &[u8]) -> Result<bool>;

    /// `POST /_bulk` with a line-delimited payload.
    ///
    /// With `wait_for_refresh` the call returns only once the changes are
    /// visible to searches.
    async fn bulk(&self, payload: Vec<u8>, wait_for_refresh: bool) -> Result<Outcome>;

    /// `POST /{index}/_delete_by_query`.
    async fn delete_by_query(&self, index: &str, query: &DeleteQuery) -> Result<bool>;

    /// `GET /{index}/_search` with a JSON query body.
    async fn search(&self, index: &str, query: &[u8]) -> Result<Outcome>;
}
