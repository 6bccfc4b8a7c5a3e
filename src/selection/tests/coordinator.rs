use super::mock_store::*;
use crate::selection::{
    RecordError, SeededRandom, SelectionCoordinator, SelectionError, SelectionOutcome,
};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn two_tablet_catalog() -> MockCatalog {
    MockCatalog::new().with_subject(subject("p1", "Asha"), vec![item("a", "X"), item("b", "Y")])
}

async fn coordinator_with(
    catalog: MockCatalog,
    recorder: Arc<MockRecorder>,
) -> SelectionCoordinator {
    let coordinator = SelectionCoordinator::new(Arc::new(catalog), recorder)
        .with_random(Arc::new(SeededRandom::new(7)));
    coordinator.refresh_subjects().await.unwrap();
    coordinator
}

// ── Picking ────────────────────────────────────────────────

#[tokio::test]
async fn empty_item_set_never_calls_recorder() {
    let recorder = Arc::new(MockRecorder::new());
    let catalog = MockCatalog::new().with_subject(subject("p1", "Asha"), vec![]);
    let coordinator = coordinator_with(catalog, recorder.clone()).await;

    for _ in 0..5 {
        assert_eq!(
            coordinator.trigger_selection().await,
            SelectionOutcome::NoItemsAvailable
        );
    }
    assert_eq!(recorder.calls(), 0);
    assert_eq!(
        coordinator.last_outcome().await,
        Some(SelectionOutcome::NoItemsAvailable)
    );
}

#[tokio::test]
async fn single_trigger_records_one_of_the_items() {
    let recorder = Arc::new(MockRecorder::new());
    let coordinator = coordinator_with(two_tablet_catalog(), recorder.clone()).await;

    let outcome = coordinator.trigger_selection().await;
    let picked = match &outcome {
        SelectionOutcome::Recorded { item, .. } => item.clone(),
        other => panic!("expected Recorded, got {:?}", other),
    };
    assert!(picked.id == "a" || picked.id == "b");

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_id, picked.id);
    assert_eq!(recorder.calls(), 1);
}

#[tokio::test]
async fn failed_recording_still_reports_item() {
    let recorder = Arc::new(MockRecorder::failing());
    let coordinator = coordinator_with(two_tablet_catalog(), recorder.clone()).await;

    match coordinator.trigger_selection().await {
        SelectionOutcome::RecordingFailed { item, error } => {
            assert!(item.id == "a" || item.id == "b");
            assert!(matches!(error, RecordError::Failed(_)));
        }
        other => panic!("expected RecordingFailed, got {:?}", other),
    }
    // No automatic retry.
    assert_eq!(recorder.calls(), 1);
    assert!(recorder.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_recorder_times_out() {
    let recorder = Arc::new(MockRecorder::slow(Duration::from_secs(30)));
    let coordinator = coordinator_with(two_tablet_catalog(), recorder.clone())
        .await
        .with_record_timeout(Duration::from_millis(500));

    match coordinator.trigger_selection().await {
        SelectionOutcome::RecordingFailed { item, error } => {
            assert!(!item.id.is_empty());
            assert_eq!(error, RecordError::Timeout(500));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn picks_are_roughly_uniform() {
    let items: Vec<_> = (0..4)
        .map(|i| item(&format!("m{}", i), &format!("Tablet {}", i)))
        .collect();
    let catalog = MockCatalog::new().with_subject(subject("p1", "Asha"), items);
    let recorder = Arc::new(MockRecorder::new());
    let coordinator = coordinator_with(catalog, recorder.clone()).await;

    let rounds = 4000;
    for _ in 0..rounds {
        assert!(coordinator.trigger_selection().await.is_recorded());
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in recorder.records() {
        *counts.entry(record.item_id).or_default() += 1;
    }
    assert_eq!(counts.len(), 4);
    for (id, count) in counts {
        // Expected 1000 each; allow a wide band.
        assert!(
            (800..=1200).contains(&count),
            "item {} picked {} times",
            id,
            count
        );
    }
}

#[tokio::test]
async fn concurrent_triggers_each_record() {
    let recorder = Arc::new(MockRecorder::new());
    let coordinator = Arc::new(coordinator_with(two_tablet_catalog(), recorder.clone()).await);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let c = coordinator.clone();
        handles.push(tokio::spawn(async move { c.trigger_selection().await }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_recorded());
    }
    assert_eq!(recorder.records().len(), 20);
}

// ── Patient switching ──────────────────────────────────────

#[tokio::test]
async fn refresh_activates_first_patient_by_name() {
    let catalog = MockCatalog::new()
        .with_subject(subject("p2", "Zed"), vec![item("z", "Zinc")])
        .with_subject(subject("p1", "Asha"), vec![item("a", "Aspirin")]);
    let coordinator = coordinator_with(catalog, Arc::new(MockRecorder::new())).await;

    assert_eq!(coordinator.active_subject().await.unwrap().id, "p1");
    assert_eq!(coordinator.items().await, vec![item("a", "Aspirin")]);
    assert_eq!(coordinator.subjects().await.len(), 2);
}

#[tokio::test]
async fn change_subject_replaces_items() {
    let catalog = MockCatalog::new()
        .with_subject(subject("p1", "Asha"), vec![item("a", "Aspirin")])
        .with_subject(subject("p2", "Zed"), vec![item("z", "Zinc"), item("d", "Dolo")]);
    let coordinator = coordinator_with(catalog, Arc::new(MockRecorder::new())).await;

    assert_eq!(coordinator.change_subject("p2").await.unwrap(), 2);
    assert_eq!(coordinator.active_subject().await.unwrap().name, "Zed");
    assert_eq!(coordinator.items().await.len(), 2);
}

#[tokio::test]
async fn unknown_subject_is_rejected() {
    let coordinator = coordinator_with(two_tablet_catalog(), Arc::new(MockRecorder::new())).await;
    assert_eq!(
        coordinator.change_subject("nope").await,
        Err(SelectionError::UnknownSubject("nope".to_string()))
    );
    assert_eq!(coordinator.active_subject().await.unwrap().id, "p1");
}

#[tokio::test]
async fn failed_item_load_leaves_set_empty() {
    let catalog = two_tablet_catalog().with_subject(subject("p2", "Zed"), vec![item("z", "Zinc")]);
    let catalog = Arc::new(catalog);
    let recorder = Arc::new(MockRecorder::new());
    let coordinator = SelectionCoordinator::new(catalog.clone(), recorder.clone());
    coordinator.refresh_subjects().await.unwrap();
    assert_eq!(coordinator.items().await.len(), 2);

    catalog.fail_items.store(true, Ordering::SeqCst);
    let result = coordinator.change_subject("p2").await;
    assert!(matches!(result, Err(SelectionError::CatalogLookupFailed(_))));
    assert!(coordinator.items().await.is_empty());
    assert_eq!(
        coordinator.trigger_selection().await,
        SelectionOutcome::NoItemsAvailable
    );
    assert_eq!(recorder.calls(), 0);
}

#[tokio::test]
async fn failed_patient_load_is_reported() {
    let catalog = Arc::new(two_tablet_catalog());
    catalog.fail_subjects.store(true, Ordering::SeqCst);
    let coordinator = SelectionCoordinator::new(catalog, Arc::new(MockRecorder::new()));

    assert!(matches!(
        coordinator.refresh_subjects().await,
        Err(SelectionError::CatalogLookupFailed(_))
    ));
    assert!(coordinator.active_subject().await.is_none());
    assert!(coordinator.subjects().await.is_empty());
}
