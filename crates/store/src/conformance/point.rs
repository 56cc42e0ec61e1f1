use std::future::Future;

use super::{field_of, fields, make_customer, Seed, TestResult};
use crate::{Collection, RecordStore, StoreError};

pub(super) async fn run_point_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "point",
            "get_returns_seeded_document",
            get_returns_seeded_document(factory).await,
        ),
        TestResult::from_result(
            "point",
            "get_missing_is_not_found",
            get_missing_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "point",
            "update_merges_fields",
            update_merges_fields(factory).await,
        ),
        TestResult::from_result(
            "point",
            "update_missing_is_not_found",
            update_missing_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "point",
            "delete_removes_document",
            delete_removes_document(factory).await,
        ),
        TestResult::from_result(
            "point",
            "collections_are_disjoint",
            collections_are_disjoint(factory).await,
        ),
    ]
}

async fn get_returns_seeded_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_customer("c1", "Ada")]).await;
    let doc = s
        .get(Collection::Customers, "c1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if doc.id != "c1" {
        return Err(format!("expected id c1, got {}", doc.id));
    }
    if field_of(&doc, "name").as_deref() != Some("Ada") {
        return Err(format!("expected name Ada, got {:?}", doc.fields.get("name")));
    }
    Ok(())
}

async fn get_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(Vec::new()).await;
    match s.get(Collection::Customers, "nope").await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected NotFound, got {e}")),
        Ok(_) => Err("expected NotFound, got a document".to_string()),
    }
}

/// Update overwrites the named fields and leaves the rest alone.
async fn update_merges_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_customer("c1", "Ada")]).await;
    s.update(
        Collection::Customers,
        "c1",
        &fields(serde_json::json!({ "assignedTo": "agent-7", "department": "Wholesale" })),
    )
    .await
    .map_err(|e| format!("update: {e}"))?;

    let doc = s
        .get(Collection::Customers, "c1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if field_of(&doc, "assignedTo").as_deref() != Some("agent-7") {
        return Err("assignedTo not written".to_string());
    }
    if field_of(&doc, "department").as_deref() != Some("Wholesale") {
        return Err("department not overwritten".to_string());
    }
    if field_of(&doc, "name").as_deref() != Some("Ada") {
        return Err("untouched field name was lost".to_string());
    }
    Ok(())
}

async fn update_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(Vec::new()).await;
    match s
        .update(Collection::Customers, "ghost", &fields(serde_json::json!({ "a": 1 })))
        .await
    {
        Err(StoreError::NotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected NotFound, got {e}")),
        Ok(()) => Err("update of a missing document succeeded".to_string()),
    }
}

async fn delete_removes_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_customer("c1", "Ada")]).await;
    s.delete(Collection::Customers, "c1")
        .await
        .map_err(|e| format!("delete: {e}"))?;
    match s.get(Collection::Customers, "c1").await {
        Err(StoreError::NotFound { .. }) => {}
        other => return Err(format!("expected NotFound after delete, got {other:?}")),
    }
    match s.delete(Collection::Customers, "c1").await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => Err(format!("second delete should be NotFound, got {other:?}")),
    }
}

/// The same id in two collections names two different documents.
async fn collections_are_disjoint<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_customer("x1", "Ada")]).await;
    match s.get(Collection::Sales, "x1").await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => Err(format!("sales/x1 should not exist, got {other:?}")),
    }
}
