//! SQLite store tests against an on-disk database in a temp directory.

use super::*;
use crate::selection::{CatalogStore, ConsumptionRecorder, SeededRandom, SelectionCoordinator};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;

async fn open_store() -> (SqliteStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let url = format!("sqlite://{}", tmp.path().join("blister.db").display());
    let store = SqliteStore::open(&url).await.expect("open store");
    (store, tmp)
}

#[tokio::test]
async fn patients_are_sorted_by_name() {
    let (store, _tmp) = open_store().await;
    store.add_patient("Zed", "zed@example.com").await.unwrap();
    store.add_patient("Asha", "asha@example.com").await.unwrap();
    store.add_patient("Mina", "mina@example.com").await.unwrap();

    let names: Vec<_> = store
        .list_subjects()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Asha", "Mina", "Zed"]);
}

#[tokio::test]
async fn items_belong_to_their_patient() {
    let (store, _tmp) = open_store().await;
    let asha = store.add_patient("Asha", "asha@example.com").await.unwrap();
    let zed = store.add_patient("Zed", "zed@example.com").await.unwrap();
    store
        .add_medication(&asha.id, &NewMedication::new("Aspirin", 30, "Morning", "Dr. Smith"))
        .await
        .unwrap();
    store
        .add_medication(&zed.id, &NewMedication::new("Zinc", 10, "Night", ""))
        .await
        .unwrap();

    let items = store.list_items(&asha.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].label, "Aspirin");
    assert!(store.list_items("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_email_is_a_query_error() {
    let (store, _tmp) = open_store().await;
    store.add_patient("Asha", "asha@example.com").await.unwrap();
    let err = store
        .add_patient("Asha Again", "ASHA@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, crate::selection::StoreError::Query(_)));
}

#[tokio::test]
async fn repeated_records_are_all_kept_newest_first() {
    let (store, _tmp) = open_store().await;
    let patient = store.add_patient("Asha", "asha@example.com").await.unwrap();
    let aspirin = store
        .add_medication(&patient.id, &NewMedication::new("Aspirin", 30, "Morning", ""))
        .await
        .unwrap();

    let first = Utc::now() - Duration::minutes(10);
    let second = Utc::now();
    store.record_consumed(&aspirin.id, first).await.unwrap();
    store.record_consumed(&aspirin.id, second).await.unwrap();
    store.record_consumed(&aspirin.id, second).await.unwrap();

    let history = store.consumed_for_patient(&patient.id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].label, "Aspirin");
    assert_eq!(history[2].record.item_id, aspirin.id);
    assert!(history[0].record.consumed_at >= history[2].record.consumed_at);
    assert_eq!(
        history[2].record.consumed_at.timestamp_micros(),
        first.timestamp_micros()
    );
}

#[tokio::test]
async fn seed_demo_is_idempotent() {
    let (store, _tmp) = open_store().await;
    let first = store.seed_demo().await.unwrap();
    let second = store.seed_demo().await.unwrap();
    assert_eq!(first, second);

    let mut labels: Vec<_> = store
        .list_items(&first.id)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.label)
        .collect();
    labels.sort();
    assert_eq!(labels, vec!["Aspirin", "Vitamin D", "dolo 65"]);
}

#[tokio::test]
async fn reopening_keeps_data() {
    let tmp = TempDir::new().unwrap();
    let url = format!("sqlite://{}", tmp.path().join("blister.db").display());
    {
        let store = SqliteStore::open(&url).await.unwrap();
        store.seed_demo().await.unwrap();
    }
    let store = SqliteStore::open(&url).await.unwrap();
    assert_eq!(store.list_subjects().await.unwrap().len(), 1);
}

#[tokio::test]
async fn coordinator_records_into_sqlite() {
    let (store, _tmp) = open_store().await;
    let patient = store.seed_demo().await.unwrap();
    let store = Arc::new(store);

    let coordinator = SelectionCoordinator::new(store.clone(), store.clone())
        .with_random(Arc::new(SeededRandom::new(3)));
    coordinator.refresh_subjects().await.unwrap();

    let outcome = coordinator.trigger_selection().await;
    let picked = outcome.item().cloned().expect("an item was picked");
    assert!(outcome.is_recorded());

    let history = store.consumed_for_patient(&patient.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].record.item_id, picked.id);
    assert_eq!(history[0].label, picked.label);
}
