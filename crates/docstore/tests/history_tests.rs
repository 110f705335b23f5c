//! History log and version read tests.

#![cfg(feature = "sqlite")]

mod common;

use std::path::Path;
use std::sync::Arc;

use common::*;
use helios_docstore::backends::blob_store::ObjectStoreBlobs;
use helios_docstore::backends::sqlite::SqliteDocumentBackend;
use helios_docstore::core::{BlobStore, HistoryLog};
use helios_docstore::error::{StorageError, ValidationError};
use helios_docstore::{DocStoreConfig, ResourceTypeRegistry, VersionedResourceStore};

#[tokio::test]
async fn test_history_is_newest_first() {
    let ctx = create_context().await;

    let mut versions = Vec::new();
    for family in ["One", "Two", "Three"] {
        let saved = ctx
            .store
            .upsert(patient("p1", family), None)
            .await
            .into_result()
            .unwrap();
        versions.push(saved.version_id().to_string());
    }

    let history = ctx.store.history("Patient", "p1").await.unwrap();
    let ids: Vec<&str> = history.iter().map(|r| r.version_id()).collect();
    assert_eq!(
        ids,
        vec![versions[2].as_str(), versions[1].as_str(), versions[0].as_str()]
    );
    assert_eq!(history[0].body()["name"][0]["family"], "Three");
    assert_eq!(history[2].body()["name"][0]["family"], "One");
}

#[tokio::test]
async fn test_history_of_unknown_resource_is_empty() {
    let ctx = create_context().await;
    assert!(ctx.store.history("Patient", "nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_history_is_per_resource() {
    let ctx = create_context().await;
    ctx.store.upsert(patient("p1", "Smith"), None).await;
    ctx.store.upsert(patient("p10", "Smith"), None).await;
    ctx.store.upsert(patient("p10", "Jones"), None).await;

    assert_eq!(ctx.store.history("Patient", "p1").await.unwrap().len(), 1);
    assert_eq!(ctx.store.history("Patient", "p10").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_vread_returns_exact_version() {
    let ctx = create_context().await;
    let first = ctx
        .store
        .upsert(patient("p1", "Before"), None)
        .await
        .into_result()
        .unwrap();
    ctx.store.upsert(patient("p1", "After"), None).await;

    let old = ctx
        .store
        .vread("Patient", "p1", first.version_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(old.version_id(), first.version_id());
    assert_eq!(old.body()["name"][0]["family"], "Before");

    assert!(
        ctx.store
            .vread("Patient", "p1", "no-such-version")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_history_log_records_carry_metadata() {
    let ctx = create_context().await;
    let saved = ctx
        .store
        .upsert(patient("p1", "Smith"), None)
        .await
        .into_result()
        .unwrap();

    let records = ctx
        .store
        .history_log()
        .records("Patient", "p1")
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].version_id, saved.version_id());
    assert_eq!(records[0].serialized, saved.to_bytes().unwrap());
}

#[tokio::test]
async fn test_history_log_requires_saved_identity() {
    let log = HistoryLog::new(Arc::new(ObjectStoreBlobs::in_memory()));

    let err = log.insert(&patient("p1", "Smith")).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::MissingRequiredField { .. })
    ));
}

#[tokio::test]
async fn test_custom_history_prefix() {
    let blobs = Arc::new(ObjectStoreBlobs::in_memory());
    let store = VersionedResourceStore::new(
        Arc::new(SqliteDocumentBackend::in_memory().unwrap()),
        blobs.clone(),
        Arc::new(ResourceTypeRegistry::r4()),
        DocStoreConfig::default(),
    )
    .with_history(HistoryLog::new(blobs.clone()).with_prefix("audit/versions"));
    store.initialize().await.unwrap();

    let saved = store
        .upsert(patient("p1", "Smith"), None)
        .await
        .into_result()
        .unwrap();

    let key = format!("audit/versions/Patient/p1/{}", saved.version_id());
    assert!(blobs.get(&key).await.unwrap().is_some());
}

async fn open_store(db_path: &Path, history_root: &Path) -> VersionedResourceStore {
    let store = VersionedResourceStore::new(
        Arc::new(SqliteDocumentBackend::open(db_path).unwrap()),
        Arc::new(ObjectStoreBlobs::local(history_root).unwrap()),
        Arc::new(ResourceTypeRegistry::r4()),
        DocStoreConfig::default(),
    );
    store.initialize().await.unwrap();
    store
}

#[tokio::test]
async fn test_history_survives_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("docstore.db");
    let history_root = dir.path().join("history");

    {
        let store = open_store(&db_path, &history_root).await;
        store.upsert(patient("p1", "Smith"), None).await;
        store.upsert(patient("p1", "Jones"), None).await;
    }

    let store = open_store(&db_path, &history_root).await;
    let history = store.history("Patient", "p1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].body()["name"][0]["family"], "Jones");

    let current = store.load("p1", "Patient").await.unwrap();
    assert_eq!(current.version_id(), history[0].version_id());
}

#[tokio::test]
async fn test_rapid_writes_on_disk_stay_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir.path().join("docstore.db"), &dir.path().join("history")).await;

    for n in 0..20 {
        let id = format!("p{n}");
        let mut written = Vec::new();
        for round in 0..5 {
            let saved = store
                .upsert(patient(&id, &format!("Family{round}")), None)
                .await
                .into_result()
                .unwrap();
            written.push(saved.version_id().to_string());
        }
        written.reverse();

        let history = store.history("Patient", &id).await.unwrap();
        let listed: Vec<&str> = history.iter().map(|r| r.version_id()).collect();
        assert_eq!(listed, written, "history order for {id}");
        assert_eq!(history[0].body()["name"][0]["family"], "Family4");
    }
}
