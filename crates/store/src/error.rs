use crate::record::Collection;

/// All errors that can be returned by a RecordStore implementation.
///
/// Errors are `Clone` because a single subscription failure is fanned out to
/// every subscriber of the affected collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No document with the given id exists in the collection.
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: Collection, id: String },

    /// A batch exceeded the backend's operation ceiling. Nothing was written.
    #[error("batch of {len} operations exceeds the ceiling of {ceiling}")]
    BatchTooLarge { len: usize, ceiling: usize },

    /// The backend refused a write (validation, permission, conflict).
    #[error("write rejected for {collection}/{id}: {reason}")]
    Rejected {
        collection: Collection,
        id: String,
        reason: String,
    },

    /// The backend could not be reached or dropped the connection.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A backend-specific storage error (serialization, driver, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
