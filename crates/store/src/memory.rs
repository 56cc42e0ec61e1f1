//! In-memory `RecordStore` backend.
//!
//! Every collection is a `BTreeMap` keyed by document id, so snapshots come
//! out in id order. Each collection owns a `tokio::sync::watch` channel that
//! carries the latest full snapshot; writes publish while still holding the
//! data lock, which keeps publication order equal to commit order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;

use crate::error::StoreError;
use crate::record::{BatchOp, Collection, Document, FieldMap};
use crate::traits::{CollectionSnapshot, RecordStore, SnapshotStream, BATCH_CEILING};

type Feed = Result<CollectionSnapshot, StoreError>;

#[derive(Default)]
struct Inner {
    collections: BTreeMap<Collection, BTreeMap<String, FieldMap>>,
}

impl Inner {
    fn snapshot(&self, collection: Collection) -> CollectionSnapshot {
        let docs = self
            .collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Arc::new(docs)
    }

    fn contains(&self, collection: Collection, id: &str) -> bool {
        self.collections
            .get(&collection)
            .is_some_and(|docs| docs.contains_key(id))
    }
}

/// A `RecordStore` that keeps everything in process memory.
///
/// Used as the reference backend for the conformance suite and as the
/// store behind engine tests.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    customers: watch::Sender<Feed>,
    call_logs: watch::Sender<Feed>,
    sales: watch::Sender<Feed>,
    ceiling: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_ceiling(BATCH_CEILING)
    }

    /// A store whose batches reject more than `ceiling` operations.
    pub fn with_ceiling(ceiling: usize) -> Self {
        let empty = || watch::channel::<Feed>(Ok(Arc::new(Vec::new()))).0;
        Self {
            inner: Mutex::new(Inner::default()),
            customers: empty(),
            call_logs: empty(),
            sales: empty(),
            ceiling,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn feed(&self, collection: Collection) -> &watch::Sender<Feed> {
        match collection {
            Collection::Customers => &self.customers,
            Collection::CallLogs => &self.call_logs,
            Collection::Sales => &self.sales,
        }
    }

    fn publish(&self, inner: &Inner, collection: Collection) {
        let _previous = self
            .feed(collection)
            .send_replace(Ok(inner.snapshot(collection)));
    }

    /// Insert or replace a document and notify subscribers.
    pub fn insert(&self, collection: Collection, doc: Document) {
        let mut inner = self.lock();
        inner
            .collections
            .entry(collection)
            .or_default()
            .insert(doc.id, doc.fields);
        self.publish(&inner, collection);
    }

    /// Insert or replace many documents with a single notification.
    pub fn insert_all(&self, collection: Collection, docs: impl IntoIterator<Item = Document>) {
        let mut inner = self.lock();
        let target = inner.collections.entry(collection).or_default();
        for doc in docs {
            target.insert(doc.id, doc.fields);
        }
        self.publish(&inner, collection);
    }

    /// Current contents of `collection`, in id order.
    pub fn documents(&self, collection: Collection) -> CollectionSnapshot {
        self.lock().snapshot(collection)
    }

    /// Number of live subscriptions on `collection`.
    pub fn subscriber_count(&self, collection: Collection) -> usize {
        self.feed(collection).receiver_count()
    }

    /// Deliver `error` to every current subscriber of `collection`.
    ///
    /// Their streams terminate after the error. Later subscriptions start
    /// from a fresh snapshot as usual.
    pub fn fail_subscriptions(&self, collection: Collection, error: StoreError) {
        let _inner = self.lock();
        tracing::debug!(%collection, %error, "failing subscriptions");
        let _previous = self.feed(collection).send_replace(Err(error));
    }
}

enum SubState {
    Initial(CollectionSnapshot, watch::Receiver<Feed>),
    Live(watch::Receiver<Feed>),
    Done,
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn batch_ceiling(&self) -> usize {
        self.ceiling
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        self.lock()
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone()))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: &FieldMap,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let doc = inner
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;
        for (k, v) in fields {
            doc.insert(k.clone(), v.clone());
        }
        self.publish(&inner, collection);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let removed = inner
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_none() {
            return Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            });
        }
        self.publish(&inner, collection);
        Ok(())
    }

    async fn batch_commit(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        if ops.len() > self.ceiling {
            tracing::debug!(len = ops.len(), ceiling = self.ceiling, "oversized batch rejected");
            return Err(StoreError::BatchTooLarge {
                len: ops.len(),
                ceiling: self.ceiling,
            });
        }
        if ops.is_empty() {
            return Ok(());
        }

        let mut inner = self.lock();

        // Validate the whole batch before touching anything. A delete earlier
        // in the batch hides the document from later operations.
        {
            let mut deleted: BTreeSet<(Collection, &str)> = BTreeSet::new();
            for op in &ops {
                let key = (op.collection(), op.id());
                if deleted.contains(&key) || !inner.contains(key.0, key.1) {
                    tracing::debug!(collection = %key.0, id = key.1, "batch aborted: missing target");
                    return Err(StoreError::NotFound {
                        collection: key.0,
                        id: key.1.to_string(),
                    });
                }
                if matches!(op, BatchOp::Delete { .. }) {
                    deleted.insert(key);
                }
            }
        }

        let mut touched = BTreeSet::new();
        for op in ops {
            touched.insert(op.collection());
            match op {
                BatchOp::Update {
                    collection,
                    id,
                    fields,
                } => {
                    if let Some(doc) = inner
                        .collections
                        .get_mut(&collection)
                        .and_then(|docs| docs.get_mut(&id))
                    {
                        doc.extend(fields);
                    }
                }
                BatchOp::Delete { collection, id } => {
                    if let Some(docs) = inner.collections.get_mut(&collection) {
                        docs.remove(&id);
                    }
                }
            }
        }
        for collection in touched {
            self.publish(&inner, collection);
        }
        Ok(())
    }

    fn subscribe(&self, collection: Collection) -> SnapshotStream {
        let (initial, rx) = {
            let inner = self.lock();
            (inner.snapshot(collection), self.feed(collection).subscribe())
        };

        stream::unfold(SubState::Initial(initial, rx), |state| async move {
            match state {
                SubState::Initial(snapshot, rx) => Some((Ok(snapshot), SubState::Live(rx))),
                SubState::Live(mut rx) => {
                    rx.changed().await.ok()?;
                    let feed = rx.borrow_and_update().clone();
                    match feed {
                        Ok(snapshot) => Some((Ok(snapshot), SubState::Live(rx))),
                        Err(e) => Some((Err(e), SubState::Done)),
                    }
                }
                SubState::Done => None,
            }
        })
        .boxed()
    }
}
