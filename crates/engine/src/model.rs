//! Typed views of the three input collections.
//!
//! Documents are decoded with serde from their stored JSON shape
//! (camelCase keys, RFC 3339 timestamps, decimal totals).

use rust_decimal::Decimal;
use salesdesk_store::{Collection, Document};
use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub assigned_to: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallLog {
    pub id: String,
    pub customer_id: String,
    #[serde(default)]
    pub call_outcome: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub customer_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sale_date: OffsetDateTime,
    #[serde(default)]
    pub total: Option<Decimal>,
}

fn decode<T: serde::de::DeserializeOwned>(doc: &Document) -> Result<T, serde_json::Error> {
    serde_json::from_value(doc.to_json())
}

/// Decode every customer document.
///
/// A customer whose fields do not decode is kept with its id only, so
/// every stored customer still gets a derived row.
pub fn decode_customers(docs: &[Document]) -> Vec<Customer> {
    docs.iter()
        .map(|doc| {
            decode(doc).unwrap_or_else(|e| {
                tracing::warn!(
                    collection = %Collection::Customers,
                    id = %doc.id,
                    error = %e,
                    "undecodable customer; deriving from id only"
                );
                Customer {
                    id: doc.id.clone(),
                    ..Customer::default()
                }
            })
        })
        .collect()
}

pub fn decode_call_logs(docs: &[Document]) -> Vec<CallLog> {
    decode_skipping(Collection::CallLogs, docs)
}

pub fn decode_sales(docs: &[Document]) -> Vec<Sale> {
    decode_skipping(Collection::Sales, docs)
}

fn decode_skipping<T: serde::de::DeserializeOwned>(
    collection: Collection,
    docs: &[Document],
) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match decode(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    collection = %collection,
                    id = %doc.id,
                    error = %e,
                    "skipping undecodable document"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn call_log_decodes_from_stored_shape() {
        let doc = Document::from_json(
            "log-1",
            json!({
                "customerId": "c1",
                "callOutcome": "Successful",
                "createdAt": "2026-10-15T14:00:00Z",
                "notes": "wants a quote",
            }),
        );
        let logs = decode_call_logs(&[doc]);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].customer_id, "c1");
        assert_eq!(logs[0].created_at, datetime!(2026-10-15 14:00 UTC));
    }

    #[test]
    fn sale_total_accepts_string_and_number() {
        let docs = [
            Document::from_json(
                "s1",
                json!({ "customerId": "c1", "saleDate": "2026-09-01T00:00:00Z", "total": "125.50" }),
            ),
            Document::from_json(
                "s2",
                json!({ "customerId": "c1", "saleDate": "2026-09-02T00:00:00Z", "total": 40 }),
            ),
        ];
        let sales = decode_sales(&docs);
        assert_eq!(sales[0].total, Some(Decimal::new(12550, 2)));
        assert_eq!(sales[1].total, Some(Decimal::new(40, 0)));
    }

    #[test]
    fn malformed_sale_is_skipped() {
        let docs = [Document::from_json(
            "s1",
            json!({ "customerId": "c1", "saleDate": "last tuesday" }),
        )];
        assert!(decode_sales(&docs).is_empty());
    }

    #[test]
    fn malformed_customer_keeps_its_id() {
        let docs = [Document::from_json("c9", json!({ "name": 42 }))];
        let customers = decode_customers(&docs);
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].id, "c9");
        assert_eq!(customers[0].name, None);
    }
}
