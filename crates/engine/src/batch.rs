//! Batch Executor: commit one chunk atomically, or fall back to per-record
//! writes with a bounded retry budget.

use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use salesdesk_store::{BatchOp, Collection, RecordStore, StoreError};

use crate::report::{ChunkReport, MutationFailure, MutationRequest};

/// Retry budget for the per-record fallback path.
///
/// Built from [`EngineConfig::retry_policy`](crate::EngineConfig::retry_policy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per record, including the first.
    pub max_attempts: NonZeroU32,
    /// Fixed pause between attempts.
    pub delay: Duration,
    /// Records updated concurrently within one chunk.
    pub concurrency: NonZeroUsize,
}

/// Apply one chunk of requests to `collection`.
///
/// The chunk is first sent as a single atomic batch. If the batch is
/// rejected for any reason, every request is retried on its own through
/// [`update_with_retry`], at most `policy.concurrency` at a time. Reported
/// ids keep the chunk's order.
pub async fn execute_chunk<S>(
    store: &S,
    collection: Collection,
    chunk: &[MutationRequest],
    policy: &RetryPolicy,
) -> ChunkReport
where
    S: RecordStore + ?Sized,
{
    if chunk.is_empty() {
        return ChunkReport::default();
    }

    let ops = chunk
        .iter()
        .map(|req| BatchOp::Update {
            collection,
            id: req.id.clone(),
            fields: req.fields.clone(),
        })
        .collect();

    let batch_error = match store.batch_commit(ops).await {
        Ok(()) => {
            tracing::debug!(%collection, len = chunk.len(), "batch committed");
            return ChunkReport {
                succeeded: chunk.iter().map(|req| req.id.clone()).collect(),
                failed: Vec::new(),
            };
        }
        Err(e) => e,
    };

    tracing::warn!(
        %collection,
        len = chunk.len(),
        error = %batch_error,
        "batch commit failed; retrying records individually"
    );

    let outcomes: Vec<(String, Result<(), StoreError>)> = stream::iter(chunk)
        .map(|req| async move {
            let result = update_with_retry(store, collection, req, policy).await;
            (req.id.clone(), result)
        })
        .buffered(policy.concurrency.get())
        .collect()
        .await;

    let mut report = ChunkReport::default();
    for (id, result) in outcomes {
        match result {
            Ok(()) => report.succeeded.push(id),
            Err(error) => report.failed.push(MutationFailure { id, error }),
        }
    }
    report
}

/// Update one record, retrying on any error until the budget runs out.
///
/// Makes at most `policy.max_attempts` calls, sleeping `policy.delay`
/// between them. Returns the last error on exhaustion.
pub async fn update_with_retry<S>(
    store: &S,
    collection: Collection,
    req: &MutationRequest,
    policy: &RetryPolicy,
) -> Result<(), StoreError>
where
    S: RecordStore + ?Sized,
{
    let max_attempts = policy.max_attempts.get();
    let mut attempt = 1;
    loop {
        match store.update(collection, &req.id, &req.fields).await {
            Ok(()) => return Ok(()),
            Err(error) if attempt >= max_attempts => {
                tracing::warn!(%collection, id = %req.id, attempts = attempt, %error, "record update failed");
                return Err(error);
            }
            Err(error) => {
                tracing::debug!(%collection, id = %req.id, attempt, %error, "record update failed; will retry");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
