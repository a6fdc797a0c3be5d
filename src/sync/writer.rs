//! Sending mutations to the index store and accounting for them.

use log::{info, warn};
use uuid::Uuid;

use crate::bulk::{self, BulkRequestBuilder};
use crate::error::Result;
use crate::model::{Collection, Concept};
use crate::sync::report::{FailedOperation, SyncReport};
use crate::transport::{DeleteQuery, IndexTransport, Outcome};

/// Longest response excerpt kept in a failure record.
const DETAIL_LIMIT: usize = 512;

/// Writes documents through an [`IndexTransport`].
///
/// Store-level failures are logged and recorded in the [`SyncReport`] handed
/// to each call; only network faults come back as `Err`.
#[derive(Debug, Clone, Copy)]
pub struct IndexWriter<'a> {
    transport: &'a dyn IndexTransport,
    batch_size: usize,
}

impl<'a> IndexWriter<'a> {
    pub fn new(transport: &'a dyn IndexTransport, batch_size: usize) -> Self {
        Self {
            transport,
            batch_size: batch_size.max(1),
        }
    }

    /// Upsert collection documents, and delete the documents of
    /// `removed` collections, in one request.
    pub async fn write_collections(
        &self,
        index: &str,
        collections: &[Collection],
        removed: &[Uuid],
        wait_for_refresh: bool,
        report: &mut SyncReport,
    ) -> Result<()> {
        let mut builder = BulkRequestBuilder::new(index);
        for collection in collections {
            builder.index_collection(collection)?;
        }
        for id in removed {
            builder.delete(&id.to_string())?;
        }
        self.send("index collections", builder, wait_for_refresh, report).await
    }

    /// Upsert concept documents, split into batches.
    pub async fn write_concepts(
        &self,
        index: &str,
        concepts: &[Concept],
        wait_for_refresh: bool,
        report: &mut SyncReport,
    ) -> Result<()> {
        for builder in bulk::chunks(index, concepts, self.batch_size)? {
            self.send("index concepts", builder, wait_for_refresh, report).await?;
        }
        Ok(())
    }

    /// Upsert `upserts` and delete the documents of `deletes` in one request.
    pub async fn write_concept_changes(
        &self,
        index: &str,
        collection_id: Uuid,
        upserts: &[Concept],
        deletes: &[Uuid],
        wait_for_refresh: bool,
        report: &mut SyncReport,
    ) -> Result<()> {
        let builder = bulk::render_concepts(index, upserts, collection_id, deletes)?;
        self.send("update concepts", builder, wait_for_refresh, report).await
    }

    /// Run a delete-by-query, recording a failure if the store refuses it.
    pub async fn delete_matching(&self, index: &str, query: &DeleteQuery, report: &mut SyncReport) -> Result<()> {
        if self.transport.delete_by_query(index, query).await? {
            info!("deleted documents of {index} matching {query:?}");
        } else {
            warn!("delete by query {query:?} on {index} failed");
            report.failures.push(FailedOperation {
                operation: "delete by query",
                index: index.to_string(),
                documents: 0,
                status: None,
                detail: String::new(),
            });
        }
        Ok(())
    }

    async fn send(
        &self,
        operation: &'static str,
        builder: BulkRequestBuilder,
        wait_for_refresh: bool,
        report: &mut SyncReport,
    ) -> Result<()> {
        if builder.is_empty() {
            return Ok(());
        }

        let index = builder.index_name().to_string();
        let (upserts, deletes) = (builder.upserts(), builder.deletes());
        let outcome = self.transport.bulk(builder.build(), wait_for_refresh).await?;

        if !outcome.success() {
            warn!(
                "{operation} on {index} failed with status {}: {} documents not written",
                outcome.status,
                upserts + deletes
            );
            report.failures.push(failure(operation, &index, upserts + deletes, &outcome));
            return Ok(());
        }

        let item_errors = outcome.bulk_item_errors();
        if item_errors > 0 {
            warn!("{operation} on {index}: {item_errors} of {} items rejected", upserts + deletes);
        }

        info!("{operation} on {index}: {upserts} upserted, {deletes} deleted");
        report.indexed += upserts;
        report.deleted += deletes;
        Ok(())
    }
}

fn failure(operation: &'static str, index: &str, documents: usize, outcome: &Outcome) -> FailedOperation {
    let mut detail = outcome.body.trim().to_string();
    if detail.len() > DETAIL_LIMIT {
        let mut cut = DETAIL_LIMIT;
        while !detail.is_char_boundary(cut) {
            cut -= 1;
        }
        detail.truncate(cut);
    }
    FailedOperation {
        operation,
        index: index.to_string(),
        documents,
        status: Some(outcome.status),
        detail,
    }
}
