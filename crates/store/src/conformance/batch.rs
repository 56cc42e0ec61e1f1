use std::future::Future;

use super::{field_of, fields, make_customer, Seed, TestResult};
use crate::{BatchOp, Collection, RecordStore, StoreError};

pub(super) async fn run_batch_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "batch",
            "all_updates_visible_after_commit",
            all_updates_visible_after_commit(factory).await,
        ),
        TestResult::from_result(
            "batch",
            "failing_op_aborts_whole_batch",
            failing_op_aborts_whole_batch(factory).await,
        ),
        TestResult::from_result(
            "batch",
            "over_ceiling_rejected_without_writes",
            over_ceiling_rejected_without_writes(factory).await,
        ),
        TestResult::from_result(
            "batch",
            "batch_at_ceiling_accepted",
            batch_at_ceiling_accepted(factory).await,
        ),
        TestResult::from_result(
            "batch",
            "empty_batch_is_noop",
            empty_batch_is_noop(factory).await,
        ),
        TestResult::from_result(
            "batch",
            "mixed_update_and_delete",
            mixed_update_and_delete(factory).await,
        ),
    ]
}

fn assign(id: &str, agent: &str) -> BatchOp {
    BatchOp::Update {
        collection: Collection::Customers,
        id: id.to_string(),
        fields: fields(serde_json::json!({ "assignedTo": agent })),
    }
}

async fn assignee<S: RecordStore>(s: &S, id: &str) -> Result<Option<String>, String> {
    s.get(Collection::Customers, id)
        .await
        .map(|doc| field_of(&doc, "assignedTo"))
        .map_err(|e| format!("get {id}: {e}"))
}

async fn all_updates_visible_after_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_customer("c1", "Ada"), make_customer("c2", "Grace")]).await;
    s.batch_commit(vec![assign("c1", "agent-1"), assign("c2", "agent-2")])
        .await
        .map_err(|e| format!("batch: {e}"))?;

    if assignee(&s, "c1").await?.as_deref() != Some("agent-1") {
        return Err("c1 not updated".to_string());
    }
    if assignee(&s, "c2").await?.as_deref() != Some("agent-2") {
        return Err("c2 not updated".to_string());
    }
    Ok(())
}

/// One op targets a missing document; the valid op must not land either.
async fn failing_op_aborts_whole_batch<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_customer("c1", "Ada")]).await;
    let result = s
        .batch_commit(vec![assign("c1", "agent-1"), assign("missing", "agent-2")])
        .await;
    if result.is_ok() {
        return Err("batch with a missing target committed".to_string());
    }
    if let Some(agent) = assignee(&s, "c1").await? {
        return Err(format!("partial write visible: c1 assigned to {agent}"));
    }
    Ok(())
}

async fn over_ceiling_rejected_without_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_customer("c1", "Ada")]).await;
    let ceiling = s.batch_ceiling();
    let ops = (0..=ceiling).map(|_| assign("c1", "agent-1")).collect();
    match s.batch_commit(ops).await {
        Err(StoreError::BatchTooLarge { len, ceiling: c }) => {
            if len != ceiling + 1 || c != ceiling {
                return Err(format!("wrong BatchTooLarge payload: len={len} ceiling={c}"));
            }
        }
        other => return Err(format!("expected BatchTooLarge, got {other:?}")),
    }
    if assignee(&s, "c1").await?.is_some() {
        return Err("oversized batch wrote data".to_string());
    }
    Ok(())
}

async fn batch_at_ceiling_accepted<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let probe = factory(Vec::new()).await;
    let ceiling = probe.batch_ceiling();
    drop(probe);

    let ids: Vec<String> = (0..ceiling).map(|i| format!("c{i:04}")).collect();
    let seed = ids.iter().map(|id| make_customer(id, "bulk")).collect();
    let s = factory(seed).await;

    let ops = ids.iter().map(|id| assign(id, "agent-9")).collect();
    s.batch_commit(ops)
        .await
        .map_err(|e| format!("batch of exactly {ceiling}: {e}"))?;

    for id in [&ids[0], &ids[ceiling - 1]] {
        if assignee(&s, id).await?.as_deref() != Some("agent-9") {
            return Err(format!("{id} not updated"));
        }
    }
    Ok(())
}

async fn empty_batch_is_noop<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(Vec::new()).await;
    s.batch_commit(Vec::new())
        .await
        .map_err(|e| format!("empty batch: {e}"))
}

async fn mixed_update_and_delete<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_customer("c1", "Ada"), make_customer("c2", "Grace")]).await;
    s.batch_commit(vec![
        assign("c1", "agent-1"),
        BatchOp::Delete {
            collection: Collection::Customers,
            id: "c2".to_string(),
        },
    ])
    .await
    .map_err(|e| format!("batch: {e}"))?;

    if assignee(&s, "c1").await?.as_deref() != Some("agent-1") {
        return Err("c1 not updated".to_string());
    }
    match s.get(Collection::Customers, "c2").await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => Err(format!("c2 should be deleted, got {other:?}")),
    }
}
