use std::sync::Arc;

use futures_util::StreamExt;
use salesdesk_store::{RecordStore, StoreError};

use crate::audit::{IdentityProvider, StaticIdentity};
use crate::cache::{AggregationCache, Invalidate};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::coordinator::BulkMutationCoordinator;
use crate::error::EngineError;
use crate::pipeline::{DerivedList, DerivedStream};
use crate::report::{BulkMutationReport, MutationRequest};

/// The sales-call engine: live aggregation plus chunked bulk mutation.
///
/// This is the in-process surface offered to UI, export, and CRUD
/// collaborators.
pub struct SalesCallEngine<S: RecordStore> {
    cache: Arc<AggregationCache>,
    coordinator: BulkMutationCoordinator<S>,
}

impl<S: RecordStore> SalesCallEngine<S> {
    /// Build an engine with the system clock and no acting user.
    pub fn new(store: Arc<S>, config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_collaborators(
            store,
            config,
            Arc::new(StaticIdentity::anonymous()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_collaborators(
        store: Arc<S>,
        config: EngineConfig,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let cache = Arc::new(AggregationCache::new(
            store.clone(),
            clock.clone(),
            config.derive_settings(),
        ));
        let coordinator =
            BulkMutationCoordinator::new(store, cache.clone(), identity, clock, config)?;
        Ok(Self { cache, coordinator })
    }

    /// Live stream of the full sales-call list.
    ///
    /// Must be called within a tokio runtime.
    pub fn subscribe_derived(&self) -> DerivedStream {
        self.cache.subscribe()
    }

    /// The current sales-call list, read once.
    pub async fn snapshot(&self) -> Result<DerivedList, StoreError> {
        let mut stream = self.subscribe_derived();
        match stream.next().await {
            Some(result) => result,
            None => Err(StoreError::Unavailable(
                "derived feed closed before producing a snapshot".to_string(),
            )),
        }
    }

    /// Apply field updates to many customers. See
    /// [`BulkMutationCoordinator::bulk_update`].
    pub async fn bulk_update(
        &self,
        requests: Vec<MutationRequest>,
    ) -> Result<BulkMutationReport, EngineError> {
        self.coordinator.bulk_update(requests).await
    }

    /// Rebuild the derived feed's input chain; live subscribers follow it.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Handle for single-record CRUD paths to invalidate after their writes.
    pub fn invalidator(&self) -> Arc<dyn Invalidate> {
        self.cache.clone()
    }

    pub fn cache(&self) -> &AggregationCache {
        &self.cache
    }
}
