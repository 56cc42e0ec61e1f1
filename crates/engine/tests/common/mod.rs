//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use salesdesk_engine::Invalidate;
use salesdesk_store::{
    BatchOp, Collection, Document, FieldMap, MemoryStore, RecordStore, SnapshotStream, StoreError,
};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

// ──────────────────────────────────────────────
// FaultyStore
// ──────────────────────────────────────────────

/// A `MemoryStore` wrapper that counts calls and injects failures.
pub struct FaultyStore {
    pub inner: MemoryStore,
    fail_batches: AtomicBool,
    always_failing: Mutex<HashSet<String>>,
    flaky: Mutex<HashMap<String, u32>>,
    update_latency: Mutex<Option<Duration>>,
    batch_sizes: Mutex<Vec<usize>>,
    update_attempts: Mutex<HashMap<String, usize>>,
    batches_in_flight: AtomicUsize,
    max_batches_in_flight: AtomicUsize,
    updates_in_flight: AtomicUsize,
    max_updates_in_flight: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_batches: AtomicBool::new(false),
            always_failing: Mutex::new(HashSet::new()),
            flaky: Mutex::new(HashMap::new()),
            update_latency: Mutex::new(None),
            batch_sizes: Mutex::new(Vec::new()),
            update_attempts: Mutex::new(HashMap::new()),
            batches_in_flight: AtomicUsize::new(0),
            max_batches_in_flight: AtomicUsize::new(0),
            updates_in_flight: AtomicUsize::new(0),
            max_updates_in_flight: AtomicUsize::new(0),
        }
    }

    /// A store holding `n` customers `c000`, `c001`, ...
    pub fn with_customers(n: usize) -> Self {
        let inner = MemoryStore::new();
        inner.insert_all(Collection::Customers, (0..n).map(|i| customer(&cid(i), "Retail")));
        Self::new(inner)
    }

    pub fn reject_batches(&self) {
        self.fail_batches.store(true, Ordering::SeqCst);
    }

    /// Every single-record update of `id` fails.
    pub fn always_fail(&self, id: &str) {
        self.always_failing.lock().unwrap().insert(id.to_string());
    }

    /// The first `times` single-record updates of `id` fail.
    pub fn fail_first(&self, id: &str, times: u32) {
        self.flaky.lock().unwrap().insert(id.to_string(), times);
    }

    pub fn set_update_latency(&self, latency: Duration) {
        *self.update_latency.lock().unwrap() = Some(latency);
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_sizes.lock().unwrap().len()
    }

    pub fn update_calls(&self) -> usize {
        self.update_attempts.lock().unwrap().values().sum()
    }

    pub fn attempts_for(&self, id: &str) -> usize {
        self.update_attempts
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub fn max_batches_in_flight(&self) -> usize {
        self.max_batches_in_flight.load(Ordering::SeqCst)
    }

    pub fn max_updates_in_flight(&self) -> usize {
        self.max_updates_in_flight.load(Ordering::SeqCst)
    }

    fn injected_failure(&self, id: &str) -> Option<StoreError> {
        if self.always_failing.lock().unwrap().contains(id) {
            return Some(rejected(id));
        }
        let mut flaky = self.flaky.lock().unwrap();
        match flaky.get_mut(id) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Some(StoreError::Unavailable(format!("transient failure on {id}")))
            }
            _ => None,
        }
    }
}

fn rejected(id: &str) -> StoreError {
    StoreError::Rejected {
        collection: Collection::Customers,
        id: id.to_string(),
        reason: "malformed field".to_string(),
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    fn batch_ceiling(&self) -> usize {
        self.inner.batch_ceiling()
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: &FieldMap,
    ) -> Result<(), StoreError> {
        *self
            .update_attempts
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_insert(0) += 1;

        let now = self.updates_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_updates_in_flight.fetch_max(now, Ordering::SeqCst);
        let latency = *self.update_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let result = match self.injected_failure(id) {
            Some(e) => Err(e),
            None => self.inner.update(collection, id, fields).await,
        };
        self.updates_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, id).await
    }

    async fn batch_commit(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        self.batch_sizes.lock().unwrap().push(ops.len());
        let now = self.batches_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_batches_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let failing = ops
            .iter()
            .find(|op| self.always_failing.lock().unwrap().contains(op.id()))
            .map(|op| rejected(op.id()));
        let result = if self.fail_batches.load(Ordering::SeqCst) {
            Err(StoreError::Backend("batch rejected".to_string()))
        } else if let Some(e) = failing {
            Err(e)
        } else {
            self.inner.batch_commit(ops).await
        };
        self.batches_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn subscribe(&self, collection: Collection) -> SnapshotStream {
        self.inner.subscribe(collection)
    }
}

// ──────────────────────────────────────────────
// CountingInvalidator
// ──────────────────────────────────────────────

#[derive(Default)]
pub struct CountingInvalidator(AtomicUsize);

impl CountingInvalidator {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Invalidate for CountingInvalidator {
    fn invalidate(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

// ──────────────────────────────────────────────
// Document fixtures
// ──────────────────────────────────────────────

pub fn cid(i: usize) -> String {
    format!("c{i:03}")
}

pub fn ts(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap()
}

pub fn customer(id: &str, department: &str) -> Document {
    Document::from_json(
        id,
        json!({
            "name": format!("Customer {id}"),
            "phone": "+1-555-0100",
            "email": format!("{id}@example.com"),
            "department": department,
        }),
    )
}

pub fn call_log(id: &str, customer_id: &str, outcome: &str, at: OffsetDateTime) -> Document {
    Document::from_json(
        id,
        json!({
            "customerId": customer_id,
            "callOutcome": outcome,
            "createdAt": ts(at),
            "notes": format!("call {id}"),
        }),
    )
}

pub fn sale(id: &str, customer_id: &str, at: OffsetDateTime, total: &str) -> Document {
    Document::from_json(
        id,
        json!({
            "customerId": customer_id,
            "saleDate": ts(at),
            "total": total,
        }),
    )
}

/// Poll `cond` until it holds, giving spawned tasks time to run.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

pub fn shared(store: FaultyStore) -> Arc<FaultyStore> {
    Arc::new(store)
}
