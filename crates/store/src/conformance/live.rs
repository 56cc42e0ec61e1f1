use std::future::Future;
use std::time::Duration;

use futures_util::StreamExt;

use super::{fields, make_customer, Seed, TestResult};
use crate::{Collection, CollectionSnapshot, RecordStore, SnapshotStream};

/// How long to wait for a pushed snapshot before declaring it missing.
const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

pub(super) async fn run_live_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "live",
            "first_item_is_current_snapshot",
            first_item_is_current_snapshot(factory).await,
        ),
        TestResult::from_result(
            "live",
            "update_pushes_full_snapshot",
            update_pushes_full_snapshot(factory).await,
        ),
        TestResult::from_result(
            "live",
            "batch_pushes_post_commit_state",
            batch_pushes_post_commit_state(factory).await,
        ),
        TestResult::from_result(
            "live",
            "delete_pushes_snapshot_without_document",
            delete_pushes_snapshot_without_document(factory).await,
        ),
    ]
}

async fn next_snapshot(stream: &mut SnapshotStream) -> Result<CollectionSnapshot, String> {
    match tokio::time::timeout(PUSH_TIMEOUT, stream.next()).await {
        Err(_) => Err("timed out waiting for snapshot".to_string()),
        Ok(None) => Err("stream ended".to_string()),
        Ok(Some(Err(e))) => Err(format!("stream error: {e}")),
        Ok(Some(Ok(snapshot))) => Ok(snapshot),
    }
}

async fn first_item_is_current_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_customer("c1", "Ada"), make_customer("c2", "Grace")]).await;
    let mut stream = s.subscribe(Collection::Customers);
    let snapshot = next_snapshot(&mut stream).await?;
    let ids: Vec<&str> = snapshot.iter().map(|d| d.id.as_str()).collect();
    if ids.len() != 2 || !ids.contains(&"c1") || !ids.contains(&"c2") {
        return Err(format!("expected [c1, c2], got {ids:?}"));
    }
    Ok(())
}

async fn update_pushes_full_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_customer("c1", "Ada"), make_customer("c2", "Grace")]).await;
    let mut stream = s.subscribe(Collection::Customers);
    next_snapshot(&mut stream).await?;

    s.update(
        Collection::Customers,
        "c2",
        &fields(serde_json::json!({ "assignedTo": "agent-3" })),
    )
    .await
    .map_err(|e| format!("update: {e}"))?;

    let snapshot = next_snapshot(&mut stream).await?;
    if snapshot.len() != 2 {
        return Err(format!("expected full snapshot of 2, got {}", snapshot.len()));
    }
    let c2 = snapshot
        .iter()
        .find(|d| d.id == "c2")
        .ok_or("c2 missing from snapshot")?;
    if c2.fields.get("assignedTo") != Some(&serde_json::json!("agent-3")) {
        return Err("pushed snapshot does not carry the update".to_string());
    }
    Ok(())
}

/// Subscribers never observe a half-applied batch.
async fn batch_pushes_post_commit_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_customer("c1", "Ada"), make_customer("c2", "Grace")]).await;
    let mut stream = s.subscribe(Collection::Customers);
    next_snapshot(&mut stream).await?;

    let ops = ["c1", "c2"]
        .iter()
        .map(|id| crate::BatchOp::Update {
            collection: Collection::Customers,
            id: id.to_string(),
            fields: fields(serde_json::json!({ "department": "Enterprise" })),
        })
        .collect();
    s.batch_commit(ops)
        .await
        .map_err(|e| format!("batch: {e}"))?;

    let snapshot = next_snapshot(&mut stream).await?;
    let updated = snapshot
        .iter()
        .filter(|d| d.fields.get("department") == Some(&serde_json::json!("Enterprise")))
        .count();
    if updated != 2 {
        return Err(format!("expected both documents updated, saw {updated}"));
    }
    Ok(())
}

async fn delete_pushes_snapshot_without_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_customer("c1", "Ada"), make_customer("c2", "Grace")]).await;
    let mut stream = s.subscribe(Collection::Customers);
    next_snapshot(&mut stream).await?;

    s.delete(Collection::Customers, "c1")
        .await
        .map_err(|e| format!("delete: {e}"))?;

    let snapshot = next_snapshot(&mut stream).await?;
    if snapshot.iter().any(|d| d.id == "c1") || snapshot.len() != 1 {
        return Err(format!(
            "expected only c2 after delete, got {:?}",
            snapshot.iter().map(|d| &d.id).collect::<Vec<_>>()
        ));
    }
    Ok(())
}
