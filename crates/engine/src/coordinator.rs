//! Bulk Mutation Coordinator.
//!
//! Drives the chunker and the batch executor over a whole request list,
//! one chunk at a time, and busts the aggregation cache once at the end.

use std::sync::Arc;

use salesdesk_store::{Collection, RecordStore};

use crate::audit::{self, IdentityProvider};
use crate::batch::{execute_chunk, RetryPolicy};
use crate::cache::Invalidate;
use crate::chunk::chunk;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::report::{BulkMutationReport, MutationRequest};

pub struct BulkMutationCoordinator<S: RecordStore> {
    store: Arc<S>,
    invalidator: Arc<dyn Invalidate>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    policy: RetryPolicy,
    collection: Collection,
}

impl<S: RecordStore> BulkMutationCoordinator<S> {
    /// Fails if `config` does not validate.
    pub fn new(
        store: Arc<S>,
        invalidator: Arc<dyn Invalidate>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let policy = config.retry_policy()?;
        Ok(Self {
            store,
            invalidator,
            identity,
            clock,
            config,
            policy,
            collection: Collection::Customers,
        })
    }

    /// Apply `requests` to the customer collection.
    ///
    /// Requests are split at the store's batch ceiling and each chunk is
    /// executed to completion, fallback retries included, before the next
    /// starts. Per-record failures land in the report; they never fail the
    /// call. Once every chunk has been attempted the cache is invalidated
    /// exactly once.
    ///
    /// An empty request list returns an empty report without touching the
    /// store or the cache.
    ///
    /// Returns `Err` only for caller or programmer defects: an unusable
    /// chunk size, or a report that does not account for every request.
    pub async fn bulk_update(
        &self,
        requests: Vec<MutationRequest>,
    ) -> Result<BulkMutationReport, EngineError> {
        if requests.is_empty() {
            return Ok(BulkMutationReport::default());
        }

        let requested = requests.len();
        let size = self.config.chunk_size(self.store.batch_ceiling())?;
        let requests = self.with_audit_fields(requests);
        let chunks = chunk(requests, size);
        let chunk_count = chunks.len();

        tracing::info!(
            collection = %self.collection,
            requested,
            chunks = chunk_count,
            chunk_size = size.get(),
            "bulk update started"
        );

        let mut report = BulkMutationReport::default();
        for (index, group) in chunks.iter().enumerate() {
            let outcome = execute_chunk(&*self.store, self.collection, group, &self.policy).await;
            tracing::debug!(
                chunk = index,
                succeeded = outcome.succeeded.len(),
                failed = outcome.failed.len(),
                "chunk finished"
            );
            report.absorb(outcome);
        }

        self.invalidator.invalidate();

        if report.total() != requested {
            return Err(EngineError::ReportMismatch {
                requested,
                accounted: report.total(),
                succeeded: report.success_count,
                failed: report.failures.len(),
            });
        }

        tracing::info!(
            collection = %self.collection,
            succeeded = report.success_count,
            failed = report.failures.len(),
            "bulk update finished"
        );
        Ok(report)
    }

    fn with_audit_fields(&self, mut requests: Vec<MutationRequest>) -> Vec<MutationRequest> {
        let user = self.identity.acting_user();
        let now = self.clock.now();
        for req in &mut requests {
            audit::stamp(&mut req.fields, user.as_deref(), now);
        }
        requests
    }
}
