//! Rule-driven search over the SQLite backend.

#![cfg(feature = "sqlite")]

mod common;

use std::collections::HashSet;

use serde_json::json;

use common::*;
use helios_docstore::backends::sqlite::SELECT_ALL_QUERY;
use helios_docstore::error::{BackendError, SearchError, StorageError};
use helios_docstore::types::Resource;
use helios_docstore::{DocStoreConfig, SearchRequest};

async fn seed_patients(ctx: &TestContext) {
    for (id, family) in [("p1", "Smith"), ("p2", "Jones"), ("p3", "Brown")] {
        assert!(ctx.store.upsert(patient(id, family), None).await.is_success());
    }
}

fn request(params: &[(&str, &str)]) -> SearchRequest {
    SearchRequest::parse(params, &DocStoreConfig::default()).unwrap()
}

fn ids<'a>(resources: impl Iterator<Item = &'a Resource>) -> Vec<String> {
    let mut ids: Vec<String> = resources.map(|r| r.id().to_string()).collect();
    ids.sort();
    ids
}

// ============================================================================
// Filters
// ============================================================================

#[tokio::test]
async fn test_search_by_family_or_values() {
    let ctx = create_context().await;
    seed_patients(&ctx).await;

    let outcome = ctx
        .store
        .search("Patient", &request(&[("family", "Smith,Jones")]))
        .await
        .unwrap();

    assert_eq!(ids(outcome.matches()), vec!["p1", "p2"]);
    assert!(outcome.next_token.is_none());
}

#[tokio::test]
async fn test_search_without_filters_returns_all() {
    let ctx = create_context().await;
    seed_patients(&ctx).await;

    let outcome = ctx
        .store
        .search("Patient", &request(&[("nickname", "ignored")]))
        .await
        .unwrap();

    assert_eq!(ids(outcome.matches()), vec!["p1", "p2", "p3"]);
    assert_eq!(outcome.total, 3);
}

#[tokio::test]
async fn test_search_parameters_are_anded() {
    let ctx = create_context().await;
    ctx.store.upsert(observation("o1", "p1", "final"), None).await;
    ctx.store
        .upsert(observation("o2", "p1", "preliminary"), None)
        .await;
    ctx.store.upsert(observation("o3", "p2", "final"), None).await;

    let outcome = ctx
        .store
        .search(
            "Observation",
            &request(&[("patient", "p1"), ("status", "final")]),
        )
        .await
        .unwrap();

    assert_eq!(ids(outcome.matches()), vec!["o1"]);
}

#[tokio::test]
async fn test_search_token_with_system() {
    let ctx = create_context().await;
    ctx.store.upsert(observation("o1", "p1", "final"), None).await;

    let hit = ctx
        .store
        .search("Observation", &request(&[("code", "http://loinc.org|8867-4")]))
        .await
        .unwrap();
    assert_eq!(ids(hit.matches()), vec!["o1"]);

    let miss = ctx
        .store
        .search("Observation", &request(&[("code", "http://snomed.info/sct|8867-4")]))
        .await
        .unwrap();
    assert_eq!(miss.matches().count(), 0);
}

#[tokio::test]
async fn test_search_by_id_bypasses_query() {
    let ctx = create_context().await;
    seed_patients(&ctx).await;

    let found = ctx
        .store
        .search("Patient", &request(&[("_id", "p2"), ("family", "Smith")]))
        .await
        .unwrap();
    assert_eq!(ids(found.matches()), vec!["p2"]);
    assert_eq!(found.total, 1);

    let missing = ctx
        .store
        .search("Patient", &request(&[("_id", "zzz")]))
        .await
        .unwrap();
    assert_eq!(missing.total, 0);
    assert!(missing.entries.is_empty());
}

// ============================================================================
// Paging
// ============================================================================

#[tokio::test]
async fn test_paging_keeps_first_page_total() {
    let ctx = create_context().await;
    for i in 0..5 {
        ctx.store
            .upsert(patient(&format!("p{i}"), "Smith"), None)
            .await;
    }

    let first_request = request(&[("family", "Smith"), ("_count", "2")]);
    let first = ctx.store.search("Patient", &first_request).await.unwrap();
    assert_eq!(first.matches().count(), 2);
    // Without a known total the first page's count is reported.
    assert_eq!(first.total, 2);

    let mut seen: HashSet<String> = first.matches().map(|r| r.id().to_string()).collect();
    let mut token = first.next_token.clone();
    let mut pages = 1;

    while let Some(next) = token {
        let params = first_request.next_page_params(&next, first.total);
        let page_request = SearchRequest::parse(&params, &DocStoreConfig::default()).unwrap();
        let page = ctx.store.search("Patient", &page_request).await.unwrap();

        assert_eq!(page.total, first.total);
        for resource in page.matches() {
            assert!(seen.insert(resource.id().to_string()), "duplicate across pages");
        }
        token = page.next_token.clone();
        pages += 1;
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn test_query_total_from_caller() {
    let ctx = create_context().await;
    seed_patients(&ctx).await;

    let page = ctx
        .store
        .query(SELECT_ALL_QUERY, "Patient", 1, None, Some(42))
        .await
        .unwrap();
    assert_eq!(page.resources.len(), 1);
    assert_eq!(page.total, 42);
    assert!(page.has_more());

    let page = ctx
        .store
        .query(SELECT_ALL_QUERY, "Patient", 10, None, None)
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert!(!page.has_more());
}

#[tokio::test]
async fn test_invalid_page_token_is_rejected() {
    let ctx = create_context().await;
    seed_patients(&ctx).await;

    let err = ctx
        .store
        .search("Patient", &request(&[("_nextpage", "***not base64***")]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Search(SearchError::InvalidCursor { .. })
    ));
}

#[tokio::test]
async fn test_malformed_query_surfaces_backend_error() {
    let ctx = create_context().await;
    seed_patients(&ctx).await;

    let err = ctx
        .store
        .query("SELECT body FROM c WHERE ((", "Patient", 10, None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Backend(BackendError::QueryError { .. })
    ));
}

// ============================================================================
// _include
// ============================================================================

#[tokio::test]
async fn test_include_resolves_references_once() {
    let ctx = create_context().await;
    seed_patients(&ctx).await;
    ctx.store.upsert(observation("o1", "p1", "final"), None).await;
    ctx.store.upsert(observation("o2", "p1", "final"), None).await;
    ctx.store.upsert(observation("o3", "p9", "final"), None).await;

    let outcome = ctx
        .store
        .search(
            "Observation",
            &request(&[("status", "final"), ("_include", "Observation:subject")]),
        )
        .await
        .unwrap();

    assert_eq!(ids(outcome.matches()), vec!["o1", "o2", "o3"]);
    // p9 does not exist and p1 appears once.
    assert_eq!(ids(outcome.includes()), vec!["p1"]);
}

#[tokio::test]
async fn test_include_follows_adverse_event_substance() {
    let ctx = create_context().await;
    let medication = Resource::new(
        "Medication",
        json!({"resourceType": "Medication", "id": "m1", "status": "active"}),
    );
    let event = Resource::new(
        "AdverseEvent",
        json!({
            "resourceType": "AdverseEvent",
            "id": "ae1",
            "actuality": "actual",
            "suspectEntity": [{"instance": {"reference": "Medication/m1"}}]
        }),
    );
    ctx.store.upsert(medication, None).await;
    ctx.store.upsert(event, None).await;

    let outcome = ctx
        .store
        .search(
            "AdverseEvent",
            &request(&[("_include", "AdverseEvent:substance")]),
        )
        .await
        .unwrap();

    assert_eq!(ids(outcome.matches()), vec!["ae1"]);
    assert_eq!(ids(outcome.includes()), vec!["m1"]);
}

#[tokio::test]
async fn test_include_for_other_type_is_ignored() {
    let ctx = create_context().await;
    seed_patients(&ctx).await;
    ctx.store.upsert(observation("o1", "p1", "final"), None).await;

    let outcome = ctx
        .store
        .search(
            "Observation",
            &request(&[("_include", "Encounter:subject")]),
        )
        .await
        .unwrap();
    assert_eq!(outcome.includes().count(), 0);
}
