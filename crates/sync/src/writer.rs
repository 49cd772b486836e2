//! Batched write-back
//!
//! Sends the change set to the store in collection order. Writes go out in
//! small batches with a pause between batches and a shorter pause between
//! individual writes. Each write runs under the retry policy; a write that
//! still fails is logged and skipped so the rest of the batch proceeds.

use paperstack_common::changeset::{build_write_plan, PendingWrite, WriteOp};
use paperstack_common::config::NotionConfig;
use paperstack_common::errors::Result;
use paperstack_common::metrics;
use paperstack_common::models::Paper;
use paperstack_common::retry::RetryPolicy;
use paperstack_common::store::RecordStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Throughput shaping for writes
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub write_pause: Duration,
}

impl WriterOptions {
    pub fn from_config(config: &NotionConfig) -> Self {
        Self {
            batch_size: config.write_batch_size.max(1),
            batch_pause: Duration::from_millis(config.batch_pause_ms),
            write_pause: Duration::from_millis(config.write_pause_ms),
        }
    }
}

/// Counts from one write-back pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

pub struct BatchWriter {
    store: Arc<dyn RecordStore>,
    retry: RetryPolicy,
    options: WriterOptions,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn RecordStore>, retry: RetryPolicy, options: WriterOptions) -> Self {
        Self {
            store,
            retry,
            options,
        }
    }

    /// Write every changed record. Created records get their new page id.
    #[instrument(skip(self, papers), fields(records = papers.len()))]
    pub async fn write_changes(&self, collection_id: &str, papers: &mut [Paper]) -> WriteReport {
        let plan = build_write_plan(papers);
        let mut report = WriteReport {
            unchanged: plan.unchanged,
            ..Default::default()
        };

        if plan.writes.is_empty() {
            info!(unchanged = plan.unchanged, "Nothing to write");
            return report;
        }

        info!(
            creates = plan.creates(),
            updates = plan.updates(),
            unchanged = plan.unchanged,
            "Writing changes back to the store"
        );

        for (batch_no, batch) in plan.writes.chunks(self.options.batch_size.max(1)).enumerate() {
            if batch_no > 0 {
                tokio::time::sleep(self.options.batch_pause).await;
            }

            for (i, write) in batch.iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(self.options.write_pause).await;
                }

                let kind = write.op.kind();
                match self.send(collection_id, write).await {
                    Ok(created) => {
                        metrics::record_write(kind, true);
                        match created {
                            Some(page_id) => {
                                report.created += 1;
                                if let Some(paper) = papers.get_mut(write.position) {
                                    paper.page_id = Some(page_id);
                                }
                            }
                            None => report.updated += 1,
                        }
                        debug!(
                            op = kind,
                            title = %write.title,
                            fields = ?write.op.patch().field_names(),
                            "Wrote record"
                        );
                    }
                    Err(e) => {
                        metrics::record_write(kind, false);
                        report.failed += 1;
                        error!(
                            op = kind,
                            title = %write.title,
                            url = write.url.as_deref().unwrap_or("-"),
                            error = %e,
                            "Write failed, skipping record"
                        );
                    }
                }
            }
        }

        report
    }

    async fn send(&self, collection_id: &str, write: &PendingWrite) -> Result<Option<Uuid>> {
        match &write.op {
            WriteOp::Create { patch } => self
                .retry
                .run("create_record", || self.store.create_record(collection_id, patch))
                .await
                .map(Some),
            WriteOp::Update { page_id, patch } => self
                .retry
                .run("update_record", || self.store.update_record(*page_id, patch))
                .await
                .map(|_| None),
        }
    }
}
