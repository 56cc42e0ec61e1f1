//! Runs the backend-agnostic conformance suite against `MemoryStore`.

use salesdesk_store::conformance::run_conformance_suite;
use salesdesk_store::MemoryStore;

#[tokio::test]
async fn memory_store_passes_conformance_suite() {
    let report = run_conformance_suite(|seed| async move {
        let store = MemoryStore::new();
        for (collection, doc) in seed {
            store.insert(collection, doc);
        }
        store
    })
    .await;

    assert!(report.total > 0, "suite ran no tests");
    assert_eq!(report.failed, 0, "{report}");
}

#[tokio::test]
async fn small_ceiling_backend_passes_conformance_suite() {
    let report = run_conformance_suite(|seed| async move {
        let store = MemoryStore::with_ceiling(3);
        for (collection, doc) in seed {
            store.insert(collection, doc);
        }
        store
    })
    .await;

    assert_eq!(report.failed, 0, "{report}");
}
