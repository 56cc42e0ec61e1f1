//! Conformance test suite for `RecordStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `RecordStore`
//! implementation can run to verify the contract the sales-call engine
//! relies on. The suite covers:
//!
//! - **Point operations**: reads, merge updates, deletes, not-found errors
//! - **Batch commit**: all-or-nothing semantics and the operation ceiling
//! - **Live subscriptions**: initial snapshot, push on every write, isolation
//!   between collections
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh storage instance seeded with the given documents:
//!
//! ```ignore
//! use salesdesk_store::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn firestore_conformance() {
//!     let report = run_conformance_suite(|seed| async move {
//!         create_test_firestore(seed).await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod batch;
mod live;
mod point;

use std::fmt;
use std::future::Future;

use crate::record::{Collection, Document};
use crate::RecordStore;

/// Documents a factory must load into a fresh store before handing it over.
pub type Seed = Vec<(Collection, Document)>;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "point", "batch", "live").
    pub category: String,
    /// Test name (e.g. "update_merges_fields").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh store
/// holding exactly the seeded documents, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(point::run_point_tests(&factory).await);
    results.extend(batch::run_batch_tests(&factory).await);
    results.extend(live::run_live_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_customer(id: &str, name: &str) -> (Collection, Document) {
    (
        Collection::Customers,
        Document::from_json(
            id,
            serde_json::json!({
                "name": name,
                "phone": "+1-555-0100",
                "department": "Retail",
            }),
        ),
    )
}

fn fields(value: serde_json::Value) -> crate::FieldMap {
    match value {
        serde_json::Value::Object(map) => map,
        _ => crate::FieldMap::new(),
    }
}

fn field_of(doc: &Document, key: &str) -> Option<String> {
    doc.fields
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
