//! The per-customer join that produces the sales-call view.
//!
//! Everything here is a pure function of the three input snapshots and a
//! caller-supplied "now"; no clock is read.

use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::model::{CallLog, Customer, Sale};

/// Call status shown for a customer, derived from the latest call outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CallStatus {
    Pending,
    Completed,
    #[serde(rename = "Follow Up")]
    FollowUp,
    #[serde(rename = "No Answer")]
    NoAnswer,
    #[serde(rename = "Not Interested")]
    NotInterested,
    #[serde(rename = "Invalid Number")]
    InvalidNumber,
}

impl CallStatus {
    /// Map a recorded call outcome onto a status.
    ///
    /// Matching ignores case and surrounding whitespace. Outcomes outside
    /// the table leave the customer `Pending`.
    pub fn from_outcome(outcome: &str) -> CallStatus {
        match outcome.trim().to_ascii_lowercase().as_str() {
            "successful" => CallStatus::Completed,
            "callback requested" => CallStatus::FollowUp,
            "no answer" | "busy" => CallStatus::NoAnswer,
            "not interested" => CallStatus::NotInterested,
            "wrong number" => CallStatus::InvalidNumber,
            _ => CallStatus::Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallStatus::Pending => "Pending",
            CallStatus::Completed => "Completed",
            CallStatus::FollowUp => "Follow Up",
            CallStatus::NoAnswer => "No Answer",
            CallStatus::NotInterested => "Not Interested",
            CallStatus::InvalidNumber => "Invalid Number",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the sales-call view. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesCall {
    pub customer_id: String,
    pub customer_name: String,
    pub phone: String,
    pub email: String,
    pub assigned_to: Option<String>,
    pub department: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_transaction_date: Option<OffsetDateTime>,
    pub last_transaction_total: Option<Decimal>,
    pub call_status: CallStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub call_date: Option<OffsetDateTime>,
    pub notes: String,
}

/// Business thresholds applied during derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveSettings {
    /// A sale counts as the last transaction only if it is older than this.
    pub staleness: Duration,
    /// Department for customers that have none.
    pub default_department: String,
}

impl Default for DeriveSettings {
    fn default() -> Self {
        Self {
            staleness: Duration::days(14),
            default_department: "Unassigned".to_string(),
        }
    }
}

/// Join customers with their call logs and sales.
///
/// Produces exactly one row per customer, in input order. The latest call
/// log (by `created_at`, ties broken by id) drives status, date, and notes.
/// The last transaction is the newest sale dated strictly before
/// `now - settings.staleness`. If that cutoff is out of range, no sale
/// qualifies.
pub fn derive_sales_calls(
    customers: &[Customer],
    call_logs: &[CallLog],
    sales: &[Sale],
    now: OffsetDateTime,
    settings: &DeriveSettings,
) -> Vec<SalesCall> {
    let mut latest_log: HashMap<&str, &CallLog> = HashMap::new();
    for log in call_logs {
        latest_log
            .entry(log.customer_id.as_str())
            .and_modify(|best| {
                if (log.created_at, &log.id) > (best.created_at, &best.id) {
                    *best = log;
                }
            })
            .or_insert(log);
    }

    // A cutoff before the representable range admits no sale.
    let cutoff = now.checked_sub(settings.staleness);
    let mut last_sale: HashMap<&str, &Sale> = HashMap::new();
    for sale in sales
        .iter()
        .filter(|s| cutoff.is_some_and(|cutoff| s.sale_date < cutoff))
    {
        last_sale
            .entry(sale.customer_id.as_str())
            .and_modify(|best| {
                if (sale.sale_date, &sale.id) > (best.sale_date, &best.id) {
                    *best = sale;
                }
            })
            .or_insert(sale);
    }

    customers
        .iter()
        .map(|customer| {
            let log = latest_log.get(customer.id.as_str()).copied();
            let sale = last_sale.get(customer.id.as_str()).copied();
            SalesCall {
                customer_id: customer.id.clone(),
                customer_name: customer.name.clone().unwrap_or_default(),
                phone: customer.phone.clone().unwrap_or_default(),
                email: customer.email.clone().unwrap_or_default(),
                assigned_to: customer.assigned_to.clone(),
                department: customer
                    .department
                    .clone()
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| settings.default_department.clone()),
                last_transaction_date: sale.map(|s| s.sale_date),
                last_transaction_total: sale.and_then(|s| s.total),
                call_status: log
                    .and_then(|l| l.call_outcome.as_deref())
                    .map_or(CallStatus::Pending, CallStatus::from_outcome),
                call_date: log.map(|l| l.created_at),
                notes: log.and_then(|l| l.notes.clone()).unwrap_or_default(),
            }
        })
        .collect()
}
