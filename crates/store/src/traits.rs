use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::StoreError;
use crate::record::{BatchOp, Collection, Document, FieldMap};

/// Maximum number of operations a single atomic batch may contain.
///
/// Matches the most restrictive backend we target.
pub const BATCH_CEILING: usize = 500;

/// A full snapshot of one collection, shared between subscribers.
pub type CollectionSnapshot = Arc<Vec<Document>>;

/// Live stream of full collection snapshots.
///
/// The first item is the collection's state at subscription time. An `Err`
/// item is terminal: the stream yields nothing after it.
pub type SnapshotStream = BoxStream<'static, Result<CollectionSnapshot, StoreError>>;

/// The record store trait consumed by the sales-call engine.
///
/// A `RecordStore` is a thin adapter over a document database offering
/// point reads and writes, collection-scoped live subscriptions, and atomic
/// multi-document batch commits.
///
/// ## Batch Semantics
///
/// `batch_commit` is all-or-nothing. If any operation in the batch fails,
/// no operation in the batch may become visible, and the whole batch
/// returns the error. Batches longer than [`batch_ceiling`] must be
/// rejected with `StoreError::BatchTooLarge` before anything is written.
///
/// ## Subscription Semantics
///
/// `subscribe` pushes the full collection after every insert, update, or
/// delete. Snapshots are delivered in commit order, but a slow consumer may
/// only observe the latest one. Store-side failures are delivered as a
/// final `Err` item; the engine never reconnects on its own.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so they can be shared
/// across spawned tasks behind an `Arc`.
///
/// [`batch_ceiling`]: RecordStore::batch_ceiling
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Largest batch `batch_commit` accepts.
    fn batch_ceiling(&self) -> usize {
        BATCH_CEILING
    }

    // ── Point operations ─────────────────────────────────────────────────────

    /// Read one document.
    ///
    /// Returns `Err(StoreError::NotFound)` if it does not exist.
    async fn get(&self, collection: Collection, id: &str) -> Result<Document, StoreError>;

    /// Merge `fields` into an existing document.
    ///
    /// Returns `Err(StoreError::NotFound)` if it does not exist.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: &FieldMap,
    ) -> Result<(), StoreError>;

    /// Remove one document.
    ///
    /// Returns `Err(StoreError::NotFound)` if it does not exist.
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    // ── Batch operations ─────────────────────────────────────────────────────

    /// Apply every operation atomically, or none of them.
    ///
    /// An empty batch succeeds without writing.
    async fn batch_commit(&self, ops: Vec<BatchOp>) -> Result<(), StoreError>;

    // ── Live queries ─────────────────────────────────────────────────────────

    /// Subscribe to full snapshots of `collection`.
    fn subscribe(&self, collection: Collection) -> SnapshotStream;
}
