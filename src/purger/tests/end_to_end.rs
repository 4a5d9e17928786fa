use common::config::ReconcileConfig;
use purger::{
    AccessMode, InMemoryStore, MatchCondition, Orchestrator, RecordingReporter, RunMode,
    StoredValue,
};
use std::sync::Arc;
use std::time::Duration;

fn null_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::from_entries([
        ("a", StoredValue::flat("null")),
        ("b", StoredValue::flat("nullish")),
        ("c", StoredValue::flat("null")),
    ]))
}

fn reconcile(min_clean_passes: u64, pass_interval_ms: u64) -> ReconcileConfig {
    ReconcileConfig {
        enabled: true,
        min_clean_passes,
        pass_interval_ms,
        max_passes: None,
    }
}

#[tokio::test]
async fn list_exact_matches_only() {
    let orchestrator = Orchestrator::new(null_store(), 50, reconcile(1, 0));
    let condition = MatchCondition::new(AccessMode::Flat, "null");
    let mut reporter = RecordingReporter::new();

    let summary = orchestrator.list(&condition, &mut reporter).await.unwrap();

    assert_eq!(reporter.lines, vec!["a (size = 4)", "c (size = 4)"]);
    assert_eq!(summary.matched_count, 2);
    assert_eq!(summary.total_bytes, 8);
    assert_eq!(summary.average_size(), 4.0);
    assert_eq!(summary.deleted_count, 0);
}

#[tokio::test]
async fn list_substring_matches_with_min_occurrences() {
    let orchestrator = Orchestrator::new(null_store(), 50, reconcile(1, 0));
    let condition = MatchCondition::new(AccessMode::Flat, "null").with_min_occurrences(1);
    let mut reporter = RecordingReporter::new();

    let summary = orchestrator.list(&condition, &mut reporter).await.unwrap();

    assert_eq!(
        reporter.lines,
        vec!["a (size = 4)", "b (size = 7)", "c (size = 4)"]
    );
    assert_eq!(summary.matched_count, 3);
    assert_eq!(summary.total_bytes, 15);
}

#[tokio::test]
async fn list_is_independent_of_batch_size() {
    let store = Arc::new(InMemoryStore::from_entries((0..57).map(|i| {
        let value = if i % 3 == 0 { "null" } else { "keep" };
        (format!("key:{i:02}"), StoredValue::flat(value))
    })));
    let condition = MatchCondition::new(AccessMode::Flat, "null");

    let mut expected = None;
    for batch_size in [1, 7, 50, 57, 1000] {
        let orchestrator = Orchestrator::new(store.clone(), batch_size, reconcile(1, 0));
        let mut reporter = RecordingReporter::new();
        let summary = orchestrator.list(&condition, &mut reporter).await.unwrap();

        assert_eq!(summary.matched_count, 19, "batch size {batch_size}");
        match &expected {
            None => expected = Some(reporter.lines),
            Some(lines) => assert_eq!(&reporter.lines, lines, "batch size {batch_size}"),
        }
    }
}

#[tokio::test]
async fn keys_that_are_not_utf8_are_matched_and_deleted() {
    let store = Arc::new(InMemoryStore::from_entries([
        (b"session:\xff\xfe".to_vec(), StoredValue::flat("null")),
        (b"session:ok".to_vec(), StoredValue::flat("null")),
        (b"\xc3\x28".to_vec(), StoredValue::flat("keep")),
    ]));
    let orchestrator = Orchestrator::new(store.clone(), 1, reconcile(2, 0));
    let condition = MatchCondition::new(AccessMode::Flat, "null");
    let mut reporter = RecordingReporter::new();

    let summary = orchestrator
        .purge(&condition, true, &mut reporter)
        .await
        .unwrap();

    assert_eq!(summary.deleted_count, 2);
    assert_eq!(
        reporter.lines,
        vec![
            "DELETE session:ok (size = 4)",
            "DELETE session:\u{FFFD}\u{FFFD} (size = 4)",
        ]
    );
    assert_eq!(store.keys().await, vec![b"\xc3\x28".to_vec()]);
}

#[tokio::test]
async fn purge_deletes_matches_and_leaves_the_rest() {
    let store = null_store();
    let orchestrator = Orchestrator::new(store.clone(), 2, reconcile(1, 0));
    let condition = MatchCondition::new(AccessMode::Flat, "null");
    let mut reporter = RecordingReporter::new();

    let summary = orchestrator
        .purge(&condition, false, &mut reporter)
        .await
        .unwrap();

    assert_eq!(
        reporter.lines,
        vec!["DELETE a (size = 4)", "DELETE c (size = 4)"]
    );
    assert_eq!(summary.deleted_count, 2);
    assert_eq!(summary.deleted_bytes, 8);
    assert_eq!(summary.failed_delete_count, 0);
    assert_eq!(store.keys().await, vec![b"b".to_vec()]);
    assert!(reporter.passes.is_empty());
    assert_eq!(reporter.summaries, vec![(RunMode::Purge, summary)]);
}

#[tokio::test]
async fn purge_field_maps_with_size_threshold() {
    let store = Arc::new(InMemoryStore::from_entries([
        ("small", StoredValue::fields([("v", "null")])),
        (
            "large",
            StoredValue::fields([("payload", "null null null"), ("meta", "x")]),
        ),
        ("other", StoredValue::fields([("payload", "something else entirely")])),
    ]));
    let orchestrator = Orchestrator::new(store.clone(), 10, reconcile(1, 0));
    let condition = MatchCondition::new(AccessMode::FieldMap, "null")
        .with_size_threshold(10)
        .with_min_occurrences(2);
    let mut reporter = RecordingReporter::new();

    let summary = orchestrator
        .purge(&condition, false, &mut reporter)
        .await
        .unwrap();

    assert_eq!(summary.deleted_count, 1);
    assert_eq!(reporter.lines, vec!["DELETE large (size = 26)"]);
    assert!(!store.contains("large").await);
    assert!(store.contains("small").await);
    assert!(store.contains("other").await);
}

#[tokio::test]
async fn purge_skips_values_of_the_wrong_kind() {
    let store = Arc::new(InMemoryStore::from_entries([
        ("flat", StoredValue::flat("null")),
        ("map", StoredValue::fields([("null", "")])),
    ]));
    let orchestrator = Orchestrator::new(store.clone(), 10, reconcile(1, 0));
    let condition = MatchCondition::new(AccessMode::Flat, "null");
    let mut reporter = RecordingReporter::new();

    let summary = orchestrator
        .purge(&condition, false, &mut reporter)
        .await
        .unwrap();

    assert_eq!(summary.deleted_count, 1);
    assert_eq!(summary.failed_delete_count, 0);
    assert!(store.contains("map").await);
}

#[tokio::test]
async fn purge_with_reconciliation_outlasts_a_racing_writer() {
    let store = null_store();
    let writer_store = store.clone();

    // Wait until the purge removed "a", then put it back twice.
    let writer = tokio::spawn(async move {
        let mut resurrections = 0;
        while resurrections < 2 {
            if !writer_store.contains("a").await {
                writer_store.insert("a", StoredValue::flat("null")).await;
                resurrections += 1;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });

    let orchestrator = Orchestrator::new(store.clone(), 50, reconcile(20, 2));
    let condition = MatchCondition::new(AccessMode::Flat, "null");
    let mut reporter = RecordingReporter::new();

    let summary = orchestrator
        .purge(&condition, true, &mut reporter)
        .await
        .unwrap();
    writer.await.unwrap();

    assert_eq!(summary.deleted_count, 2);
    assert!(!store.contains("a").await);
    assert!(!store.contains("c").await);

    let last = reporter.passes.last().unwrap();
    assert_eq!(last.consecutive_clean, 20);
    assert_eq!(last.resurrected, 0);
    assert!(reporter.redeleted.iter().all(|key| key == "a"));
}
