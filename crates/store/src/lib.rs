pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use record::{BatchOp, Collection, Document, FieldMap};
pub use traits::{CollectionSnapshot, RecordStore, SnapshotStream, BATCH_CEILING};
