//! Request and report types for bulk mutations.

use salesdesk_store::{FieldMap, StoreError};
use serde_json::Value;

/// One field update aimed at one record.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub id: String,
    pub fields: FieldMap,
}

impl MutationRequest {
    pub fn new(id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Set a single field on one record.
    pub fn set(id: impl Into<String>, field: &str, value: impl Into<Value>) -> Self {
        let mut fields = FieldMap::new();
        fields.insert(field.to_string(), value.into());
        Self::new(id, fields)
    }

    /// Reassign every listed customer to `assignee`.
    pub fn assign<I, S>(ids: I, assignee: &str) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ids.into_iter()
            .map(|id| Self::set(id, "assignedTo", assignee))
            .collect()
    }

    /// Move every listed customer to `department`.
    pub fn set_department<I, S>(ids: I, department: &str) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ids.into_iter()
            .map(|id| Self::set(id, "department", department))
            .collect()
    }
}

/// A request that could not be applied, with the last error seen for it.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationFailure {
    pub id: String,
    pub error: StoreError,
}

/// Outcome of one chunk: which ids landed and which did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<MutationFailure>,
}

impl ChunkReport {
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a bulk call went overall, for choosing a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOutcome {
    /// Nothing was requested.
    Empty,
    Success,
    Partial,
    Failed,
}

/// Aggregate result of a bulk mutation.
///
/// `success_count + failures.len()` always equals the number of requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkMutationReport {
    pub success_count: usize,
    pub failures: Vec<MutationFailure>,
}

impl BulkMutationReport {
    pub fn total(&self) -> usize {
        self.success_count + self.failures.len()
    }

    pub fn outcome(&self) -> BulkOutcome {
        match (self.success_count, self.failures.len()) {
            (0, 0) => BulkOutcome::Empty,
            (_, 0) => BulkOutcome::Success,
            (0, _) => BulkOutcome::Failed,
            _ => BulkOutcome::Partial,
        }
    }

    pub(crate) fn absorb(&mut self, chunk: ChunkReport) {
        self.success_count += chunk.succeeded.len();
        self.failures.extend(chunk.failed);
    }
}
