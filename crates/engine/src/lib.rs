//! Live aggregation and bulk-mutation engine for the sales-call view.
//!
//! Two paths share one cache:
//!
//! - **Read**: [`SalesCallEngine::subscribe_derived`] joins the customer,
//!   call-log, and sale collections into one [`SalesCall`] row per customer,
//!   recomputed in full whenever any input changes, and shares that feed
//!   between all consumers through the [`AggregationCache`].
//! - **Write**: [`SalesCallEngine::bulk_update`] splits requests at the
//!   store's batch ceiling, commits each chunk atomically, falls back to
//!   per-record retries when a batch is rejected, and reports successes and
//!   failures per record. The cache is invalidated once at the end.

pub mod audit;
pub mod batch;
pub mod cache;
pub mod chunk;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod derive;
pub mod model;
pub mod pipeline;
pub mod report;

mod engine;
mod error;

pub use audit::{IdentityProvider, StaticIdentity};
pub use batch::RetryPolicy;
pub use cache::{AggregationCache, Invalidate};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use coordinator::BulkMutationCoordinator;
pub use derive::{derive_sales_calls, CallStatus, DeriveSettings, SalesCall};
pub use engine::SalesCallEngine;
pub use error::{ConfigError, EngineError};
pub use pipeline::{DerivedFeed, DerivedList, DerivedStream};
pub use report::{BulkMutationReport, BulkOutcome, ChunkReport, MutationFailure, MutationRequest};
