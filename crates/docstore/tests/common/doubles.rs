//! Backends with failure injection.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use helios_docstore::backends::blob_store::ObjectStoreBlobs;
use helios_docstore::backends::sqlite::SqliteDocumentBackend;
use helios_docstore::core::{
    BackendKind, BlobError, BlobMeta, BlobStore, DocumentBackend, DocumentPage, UpsertAck,
};
use helios_docstore::error::{BackendError, StorageError, StorageResult};

fn injected(message: &str) -> StorageError {
    StorageError::Backend(BackendError::Unavailable {
        backend_name: "flaky".to_string(),
        message: message.to_string(),
    })
}

/// SQLite backend whose upserts can be made to fail.
#[derive(Debug)]
pub struct FlakyBackend {
    inner: SqliteDocumentBackend,
    fail_all_upserts: AtomicBool,
    fail_upsert_ids: Mutex<HashSet<String>>,
    upsert_calls: AtomicUsize,
}

impl FlakyBackend {
    pub fn new(inner: SqliteDocumentBackend) -> Self {
        Self {
            inner,
            fail_all_upserts: AtomicBool::new(false),
            fail_upsert_ids: Mutex::new(HashSet::new()),
            upsert_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_all_upserts(&self, fail: bool) {
        self.fail_all_upserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upserts_for(&self, id: &str) {
        self.fail_upsert_ids.lock().insert(id.to_string());
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn collections(&self) -> Vec<String> {
        self.inner.collections().unwrap()
    }
}

#[async_trait]
impl DocumentBackend for FlakyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Custom("flaky-sqlite")
    }

    fn backend_name(&self) -> &'static str {
        "flaky-sqlite"
    }

    fn select_all_query(&self) -> &str {
        self.inner.select_all_query()
    }

    async fn initialize(&self) -> StorageResult<()> {
        self.inner.initialize().await
    }

    async fn create_collection_if_absent(&self, collection: &str) -> StorageResult<()> {
        self.inner.create_collection_if_absent(collection).await
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        document: &[u8],
    ) -> StorageResult<UpsertAck> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let rejected = self.fail_all_upserts.load(Ordering::SeqCst)
            || self.fail_upsert_ids.lock().contains(id);
        if rejected {
            return Err(injected("upsert rejected"));
        }
        self.inner.upsert(collection, id, document).await
    }

    async fn read(&self, collection: &str, id: &str) -> StorageResult<Option<Value>> {
        self.inner.read(collection, id).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
        self.inner.delete(collection, id).await
    }

    async fn query(
        &self,
        collection: &str,
        query: &str,
        page_size: u32,
        continuation: Option<&str>,
    ) -> StorageResult<DocumentPage> {
        self.inner
            .query(collection, query, page_size, continuation)
            .await
    }
}

/// In-memory blob store whose writes and deletes can be made to fail.
#[derive(Debug)]
pub struct FlakyBlobs {
    inner: ObjectStoreBlobs,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    deleted: Mutex<Vec<String>>,
}

impl FlakyBlobs {
    pub fn in_memory() -> Self {
        Self {
            inner: ObjectStoreBlobs::in_memory(),
            fail_puts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Keys passed to successful deletes, in call order.
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl BlobStore for FlakyBlobs {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("put rejected".to_string()));
        }
        self.inner.put(key, bytes).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("delete rejected".to_string()));
        }
        self.inner.delete(key).await?;
        self.deleted.lock().push(key.to_string());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobMeta>, BlobError> {
        self.inner.list(prefix).await
    }
}
