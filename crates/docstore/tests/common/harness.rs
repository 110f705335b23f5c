//! Store construction for tests.

use std::sync::Arc;

use helios_docstore::backends::sqlite::SqliteDocumentBackend;
use helios_docstore::{DocStoreConfig, ResourceTypeRegistry, SearchRules, VersionedResourceStore};

use super::doubles::{FlakyBackend, FlakyBlobs};

/// A store wired to test doubles that stay reachable for failure injection.
pub struct TestContext {
    pub store: Arc<VersionedResourceStore>,
    pub backend: Arc<FlakyBackend>,
    pub blobs: Arc<FlakyBlobs>,
}

/// Creates a store over an in-memory database with the embedded search rules.
pub async fn create_context() -> TestContext {
    create_context_with(DocStoreConfig::default()).await
}

/// Creates a store with a custom configuration.
pub async fn create_context_with(config: DocStoreConfig) -> TestContext {
    let backend = Arc::new(FlakyBackend::new(
        SqliteDocumentBackend::in_memory().expect("Failed to create SQLite backend"),
    ));
    let blobs = Arc::new(FlakyBlobs::in_memory());
    let rules = SearchRules::embedded().expect("Embedded rules must parse");

    let store = VersionedResourceStore::new(
        backend.clone(),
        blobs.clone(),
        Arc::new(ResourceTypeRegistry::r4()),
        config,
    )
    .with_search_rules(Arc::new(rules));
    store.initialize().await.expect("Failed to initialize store");

    TestContext {
        store: Arc::new(store),
        backend,
        blobs,
    }
}
