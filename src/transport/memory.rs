//! In-process index store.
//!
//! Understands the same requests as the real store, as far as the engine uses
//! them: line-delimited bulk payloads, delete-by-query with `match` on dotted
//! field paths or `match_all`, and searches by `ids`, `match` or `match_all`.
//! Answers use the real store's status codes and response shapes.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Value, json};

use crate::error::{Result, TermSyncError};
use crate::transport::{DeleteQuery, IndexTransport, Outcome};

/// A request as seen by the memory store, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub operation: &'static str,
    /// Target index; for bulk requests the index of the first action.
    pub index: String,
    pub wait_for_refresh: bool,
}

#[derive(Debug, Default)]
struct StoredIndex {
    settings: Value,
    mapping: Option<Value>,
    documents: BTreeMap<String, Value>,
}

/// A [`IndexTransport`] keeping its indices in memory.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    indices: RwLock<BTreeMap<String, StoredIndex>>,
    failing: RwLock<HashSet<String>>,
    requests: RwLock<Vec<RecordedRequest>>,
    unreachable: AtomicBool,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request touching `index` answer with status 500.
    pub fn set_failing(&self, index: &str, failing: bool) {
        let mut set = self.failing.write();
        if failing {
            set.insert(index.to_string());
        } else {
            set.remove(index);
        }
    }

    /// Make every request fail with a transport error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Put a document directly, bypassing the request log.
    pub fn put_document(&self, index: &str, id: &str, document: Value) {
        self.indices
            .write()
            .entry(index.to_string())
            .or_default()
            .documents
            .insert(id.to_string(), document);
    }

    /// One stored document.
    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.indices.read().get(index)?.documents.get(id).cloned()
    }

    /// Every stored document of an index, ordered by id.
    pub fn documents(&self, index: &str) -> Vec<(String, Value)> {
        self.indices
            .read()
            .get(index)
            .map(|stored| {
                stored
                    .documents
                    .iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn document_count(&self, index: &str) -> usize {
        self.indices
            .read()
            .get(index)
            .map_or(0, |stored| stored.documents.len())
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indices.read().contains_key(index)
    }

    /// Mapping put on an index, if any.
    pub fn mapping(&self, index: &str) -> Option<Value> {
        self.indices.read().get(index)?.mapping.clone()
    }

    /// Settings the index was created with.
    pub fn settings(&self, index: &str) -> Option<Value> {
        self.indices.read().get(index).map(|stored| stored.settings.clone())
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.write().clear();
    }

    fn record(&self, operation: &'static str, index: &str, wait_for_refresh: bool) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(TermSyncError::transport("connection refused"));
        }
        self.requests.write().push(RecordedRequest {
            operation,
            index: index.to_string(),
            wait_for_refresh,
        });
        Ok(())
    }

    fn is_failing(&self, index: &str) -> bool {
        self.failing.read().contains(index)
    }

    fn apply_bulk(&self, payload: &[u8]) -> Outcome {
        let Ok(text) = std::str::from_utf8(payload) else {
            return error_outcome(400, "parse_exception", "bulk payload is not UTF-8");
        };
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let mut operations = Vec::new();

        while let Some(line) = lines.next() {
            let Ok(action) = serde_json::from_str::<Value>(line) else {
                return error_outcome(400, "parse_exception", "malformed action line");
            };
            let Some((kind, meta)) = action.as_object().and_then(|obj| obj.iter().next()) else {
                return error_outcome(400, "parse_exception", "empty action line");
            };
            let index = meta.get("_index").and_then(Value::as_str).unwrap_or_default();
            let id = meta.get("_id").and_then(Value::as_str).unwrap_or_default();
            if index.is_empty() || id.is_empty() {
                return error_outcome(400, "action_request_validation_exception", "missing _index or _id");
            }
            let body = match kind.as_str() {
                "index" => match lines.next().map(serde_json::from_str::<Value>) {
                    Some(Ok(body)) => Some(body),
                    _ => return error_outcome(400, "parse_exception", "missing document body"),
                },
                "delete" => None,
                other => {
                    return error_outcome(400, "illegal_argument_exception", &format!("unknown action {other}"));
                }
            };
            operations.push((index.to_string(), id.to_string(), body));
        }

        if operations.iter().any(|(index, _, _)| self.is_failing(index)) {
            return error_outcome(500, "internal_server_error", "injected failure");
        }

        let mut indices = self.indices.write();
        let items: Vec<Value> = operations
            .into_iter()
            .map(|(index, id, body)| {
                let stored = indices.entry(index.clone()).or_default();
                match body {
                    Some(body) => {
                        let created = stored.documents.insert(id.clone(), body).is_none();
                        let (status, result) = if created { (201, "created") } else { (200, "updated") };
                        json!({"index": {"_index": index, "_id": id, "status": status, "result": result}})
                    }
                    None => {
                        let (status, result) = match stored.documents.remove(&id) {
                            Some(_) => (200, "deleted"),
                            None => (404, "not_found"),
                        };
                        json!({"delete": {"_index": index, "_id": id, "status": status, "result": result}})
                    }
                }
            })
            .collect();

        Outcome::new(200, json!({"took": 0, "errors": false, "items": items}).to_string())
    }
}

fn error_outcome(status: u16, kind: &str, reason: &str) -> Outcome {
    Outcome::new(
        status,
        json!({"error": {"type": kind, "reason": reason}, "status": status}).to_string(),
    )
}

/// Resolve a dotted path like `vocabulary.id` inside a document.
fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |value, key| value.get(key))
}

fn field_matches(document: &Value, field: &str, expected: &Value) -> bool {
    match lookup(document, field) {
        Some(Value::Array(values)) => values.contains(expected),
        Some(value) => value == expected,
        None => false,
    }
}

type Predicate = Box<dyn Fn(&str, &Value) -> bool>;

/// Compile the `query` part of a request body into a predicate over `(id, document)`.
fn compile_query(query: &Value) -> Option<Predicate> {
    let (kind, spec) = query.as_object()?.iter().next()?;
    let predicate: Predicate = match kind.as_str() {
        "match_all" => Box::new(|_, _| true),
        "match" => {
            let (field, expected) = spec.as_object()?.iter().next()?;
            let field = field.clone();
            let expected = match expected {
                Value::Object(options) => options.get("query")?.clone(),
                other => other.clone(),
            };
            Box::new(move |_, doc| field_matches(doc, &field, &expected))
        }
        "ids" => {
            let ids: HashSet<String> = spec
                .get("values")?
                .as_array()?
                .iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect();
            Box::new(move |id, _| ids.contains(id))
        }
        _ => return None,
    };
    Some(predicate)
}

#[async_trait]
impl IndexTransport for MemoryIndex {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.record("exists", index, false)?;
        Ok(self.is_failing(index) || self.has_index(index))
    }

    async fn create_index(&self, index: &str, settings: &[u8]) -> Result<bool> {
        self.record("create_index", index, false)?;
        if self.is_failing(index) {
            return Ok(false);
        }
        let Ok(settings) = serde_json::from_slice::<Value>(settings) else {
            return Ok(false);
        };
        let mut indices = self.indices.write();
        if indices.contains_key(index) {
            return Ok(false);
        }
        indices.insert(
            index.to_string(),
            StoredIndex {
                settings,
                ..Default::default()
            },
        );
        Ok(true)
    }

    async fn delete_index(&self, index: &str) -> Result<bool> {
        self.record("delete_index", index, false)?;
        if self.is_failing(index) {
            return Ok(false);
        }
        Ok(self.indices.write().remove(index).is_some())
    }

    async fn put_mapping(&self, index: &str, mapping: &[u8]) -> Result<bool> {
        self.record("put_mapping", index, false)?;
        if self.is_failing(index) {
            return Ok(false);
        }
        let Ok(mapping) = serde_json::from_slice::<Value>(mapping) else {
            return Ok(false);
        };
        match self.indices.write().get_mut(index) {
            Some(stored) => {
                stored.mapping = Some(mapping);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn bulk(&self, payload: Vec<u8>, wait_for_refresh: bool) -> Result<Outcome> {
        let first_index = std::str::from_utf8(&payload)
            .ok()
            .and_then(|text| text.lines().next())
            .and_then(|line| serde_json::from_str::<Value>(line).ok())
            .and_then(|action| {
                action
                    .as_object()?
                    .values()
                    .next()?
                    .get("_index")?
                    .as_str()
                    .map(str::to_string)
            })
            .unwrap_or_default();
        self.record("bulk", &first_index, wait_for_refresh)?;
        Ok(self.apply_bulk(&payload))
    }

    async fn delete_by_query(&self, index: &str, query: &DeleteQuery) -> Result<bool> {
        self.record("delete_by_query", index, false)?;
        if self.is_failing(index) {
            return Ok(false);
        }
        let body: Value = serde_json::from_slice(&query.to_body())?;
        let Some(predicate) = body.get("query").and_then(compile_query) else {
            return Ok(false);
        };
        let mut indices = self.indices.write();
        let Some(stored) = indices.get_mut(index) else {
            return Ok(false);
        };
        stored.documents.retain(|id, doc| !predicate(id, doc));
        Ok(true)
    }

    async fn search(&self, index: &str, query: &[u8]) -> Result<Outcome> {
        self.record("search", index, false)?;
        if self.is_failing(index) {
            return Ok(error_outcome(500, "internal_server_error", "injected failure"));
        }
        let Ok(body) = serde_json::from_slice::<Value>(query) else {
            return Ok(error_outcome(400, "parse_exception", "malformed query"));
        };
        let predicate: Predicate = match body.get("query") {
            Some(query) => match compile_query(query) {
                Some(predicate) => predicate,
                None => return Ok(error_outcome(400, "parsing_exception", "unsupported query")),
            },
            None => Box::new(|_, _| true),
        };
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;

        let indices = self.indices.read();
        let Some(stored) = indices.get(index) else {
            return Ok(error_outcome(404, "index_not_found_exception", &format!("no such index [{index}]")));
        };
        let matching: Vec<(&String, &Value)> = stored
            .documents
            .iter()
            .filter(|(id, doc)| predicate(id, doc))
            .collect();
        let hits: Vec<Value> = matching
            .iter()
            .take(size)
            .map(|(id, doc)| json!({"_index": index, "_id": id, "_score": 1.0, "_source": doc}))
            .collect();

        Ok(Outcome::new(
            200,
            json!({
                "took": 0,
                "timed_out": false,
                "hits": {"total": {"value": matching.len(), "relation": "eq"}, "hits": hits}
            })
            .to_string(),
        ))
    }
}
