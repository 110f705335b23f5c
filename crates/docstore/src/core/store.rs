//! Versioned resource store.
//!
//! [`VersionedResourceStore`] coordinates a [`DocumentBackend`] holding the
//! live documents and a [`HistoryLog`] holding every committed version. A
//! write is two-phase:
//!
//! 1. the new version is appended to the history log;
//! 2. the collection is created if needed and the document is upserted.
//!
//! The size cap is enforced in step 1, so an oversized resource never reaches
//! the backend. If step 2 fails the history entry from step 1 is deleted again. That
//! compensating delete is best effort: a failure is logged and the original
//! backend error is what the caller sees.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DocStoreConfig;
use crate::core::backend::{DocumentBackend, UpsertAck};
use crate::core::blob::BlobStore;
use crate::core::history::HistoryLog;
use crate::core::versioned::{VersionConflictInfo, check_version_match, normalize_etag};
use crate::error::{StorageError, StorageResult};
use crate::search::{IncludeDirective, SearchQueryBuilder, SearchRequest, SearchRules};
use crate::types::{
    PageCodec, QueryResult, Resource, ResourceTypeRegistry, SearchEntry, SearchEntryMode,
    SearchOutcome,
};

/// Outcome status of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertStatus {
    /// A new resource was stored.
    Created,
    /// An existing resource was replaced.
    Updated,
    /// The If-Match version did not match.
    Conflict,
    /// The write failed.
    Error,
}

/// Result of [`VersionedResourceStore::upsert`].
#[derive(Debug)]
pub enum UpsertOutcome {
    /// No resource with this identity existed.
    Created(Resource),
    /// A resource with this identity was replaced.
    Updated(Resource),
    /// The conditional check failed; nothing was written.
    Conflict(VersionConflictInfo),
    /// The write failed; history was rolled back.
    Error {
        /// The resource as it was being written.
        resource: Resource,
        /// The cause.
        error: StorageError,
    },
}

impl UpsertOutcome {
    /// Returns the status.
    pub fn status(&self) -> UpsertStatus {
        match self {
            UpsertOutcome::Created(_) => UpsertStatus::Created,
            UpsertOutcome::Updated(_) => UpsertStatus::Updated,
            UpsertOutcome::Conflict(_) => UpsertStatus::Conflict,
            UpsertOutcome::Error { .. } => UpsertStatus::Error,
        }
    }

    /// True for `Created` and `Updated`.
    pub fn is_success(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_) | UpsertOutcome::Updated(_))
    }

    /// Returns the resource, if the outcome carries one.
    pub fn resource(&self) -> Option<&Resource> {
        match self {
            UpsertOutcome::Created(r) | UpsertOutcome::Updated(r) => Some(r),
            UpsertOutcome::Error { resource, .. } => Some(resource),
            UpsertOutcome::Conflict(_) => None,
        }
    }

    /// Returns a diagnostic for conflicts and failures.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            UpsertOutcome::Conflict(info) => Some(info.diagnostic()),
            UpsertOutcome::Error { error, .. } => Some(error.to_string()),
            _ => None,
        }
    }

    /// Converts the outcome into a result, turning conflicts into errors.
    pub fn into_result(self) -> StorageResult<Resource> {
        match self {
            UpsertOutcome::Created(r) | UpsertOutcome::Updated(r) => Ok(r),
            UpsertOutcome::Conflict(info) => Err(info.into_error()),
            UpsertOutcome::Error { error, .. } => Err(error),
        }
    }
}

/// Resource store with write-ahead history and optimistic concurrency.
///
/// The store is `Send + Sync`; share it through an `Arc`.
#[derive(Debug)]
pub struct VersionedResourceStore {
    backend: Arc<dyn DocumentBackend>,
    history: HistoryLog,
    registry: Arc<ResourceTypeRegistry>,
    query_builder: SearchQueryBuilder,
    config: DocStoreConfig,
    collections: RwLock<HashSet<String>>,
}

impl VersionedResourceStore {
    /// Creates a store over injected backend handles.
    ///
    /// The history log uses the default prefix and the configured size cap.
    /// No search rules are loaded; see [`with_search_rules`](Self::with_search_rules).
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        blobs: Arc<dyn BlobStore>,
        registry: Arc<ResourceTypeRegistry>,
        config: DocStoreConfig,
    ) -> Self {
        let history = HistoryLog::new(blobs).with_max_entry_bytes(config.max_resource_bytes);
        let query_builder =
            SearchQueryBuilder::for_backend(Arc::new(SearchRules::default()), backend.as_ref());

        Self {
            backend,
            history,
            registry,
            query_builder,
            config,
            collections: RwLock::new(HashSet::new()),
        }
    }

    /// Replaces the history log, e.g. to use a different key prefix.
    pub fn with_history(mut self, history: HistoryLog) -> Self {
        self.history = history;
        self
    }

    /// Sets the search rule table.
    pub fn with_search_rules(mut self, rules: Arc<SearchRules>) -> Self {
        self.query_builder = SearchQueryBuilder::for_backend(rules, self.backend.as_ref());
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DocStoreConfig {
        &self.config
    }

    /// Returns the type registry.
    pub fn registry(&self) -> &ResourceTypeRegistry {
        &self.registry
    }

    /// Returns the history log.
    pub fn history_log(&self) -> &HistoryLog {
        &self.history
    }

    /// Returns the query builder.
    pub fn query_builder(&self) -> &SearchQueryBuilder {
        &self.query_builder
    }

    /// Opens the backend.
    pub async fn initialize(&self) -> StorageResult<()> {
        self.backend.initialize().await?;
        info!(backend = self.backend.backend_name(), "Document store initialized");
        Ok(())
    }

    async fn ensure_collection(&self, resource_type: &str) -> StorageResult<()> {
        if self.collections.read().contains(resource_type) {
            return Ok(());
        }
        self.backend.create_collection_if_absent(resource_type).await?;
        self.collections.write().insert(resource_type.to_string());
        debug!(collection = %resource_type, "Collection ready");
        Ok(())
    }

    /// Creates or replaces a resource.
    ///
    /// With `if_match`, the stored version must equal it (weak ETag syntax is
    /// accepted). A missing resource never matches. Every successful write
    /// gets a new `version_id` and `last_updated`, and a new id when the
    /// resource has none.
    pub async fn upsert(&self, mut resource: Resource, if_match: Option<&str>) -> UpsertOutcome {
        if let Err(error) = self.registry.require(resource.resource_type()) {
            return UpsertOutcome::Error { resource, error };
        }

        if let Some(expected) = if_match {
            let expected = normalize_etag(expected);
            let current = self.load(resource.id(), resource.resource_type()).await;
            if let Err(conflict) = check_version_match(
                resource.resource_type(),
                resource.id(),
                expected,
                current.as_ref().map(Resource::version_id),
            ) {
                debug!(
                    resource_type = %conflict.resource_type,
                    id = %conflict.id,
                    expected = %conflict.expected_version,
                    actual = ?conflict.actual_version,
                    "Conditional upsert rejected"
                );
                return UpsertOutcome::Conflict(conflict);
            }
        }

        if resource.id().is_empty() {
            resource.set_id(Uuid::new_v4().to_string());
        }
        // v7 ids sort in creation order; history relies on this for ties.
        resource.assign_version(Uuid::now_v7().to_string(), Utc::now());

        let bytes = match self.history.insert(&resource).await {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(
                    resource = %resource.versioned_url(),
                    error = %error,
                    "History write failed, upsert abandoned"
                );
                return UpsertOutcome::Error { resource, error };
            }
        };

        let committed: StorageResult<UpsertAck> = async {
            self.ensure_collection(resource.resource_type()).await?;
            self.backend
                .upsert(resource.resource_type(), resource.id(), &bytes)
                .await
        }
        .await;

        match committed {
            Ok(ack) => {
                debug!(
                    resource = %resource.versioned_url(),
                    created = ack.created,
                    "Resource committed"
                );
                if ack.created {
                    UpsertOutcome::Created(resource)
                } else {
                    UpsertOutcome::Updated(resource)
                }
            }
            Err(error) => {
                warn!(
                    resource = %resource.versioned_url(),
                    error = %error,
                    "Backend upsert failed, rolling back history entry"
                );
                if let Err(rollback) = self.history.delete(&resource).await {
                    warn!(
                        resource = %resource.versioned_url(),
                        error = %rollback,
                        "History rollback failed"
                    );
                }
                UpsertOutcome::Error { resource, error }
            }
        }
    }

    /// Reads the current version of a resource.
    ///
    /// Absent resources and read failures both yield `None`; failures are logged.
    pub async fn load(&self, id: &str, resource_type: &str) -> Option<Resource> {
        if id.is_empty() || !self.registry.contains(resource_type) {
            return None;
        }

        let result: StorageResult<Option<Resource>> = async {
            self.ensure_collection(resource_type).await?;
            match self.backend.read(resource_type, id).await? {
                Some(document) => self.registry.parse_document(document).map(Some),
                None => Ok(None),
            }
        }
        .await;

        match result {
            Ok(resource) => resource,
            Err(error) => {
                warn!(resource_type = %resource_type, id = %id, error = %error, "Load failed");
                None
            }
        }
    }

    /// Removes the live document. History is kept.
    ///
    /// Returns `false` if the backend reports a failure.
    pub async fn delete(&self, resource: &Resource) -> bool {
        let result: StorageResult<bool> = async {
            self.ensure_collection(resource.resource_type()).await?;
            self.backend
                .delete(resource.resource_type(), resource.id())
                .await
        }
        .await;

        match result {
            Ok(existed) => {
                debug!(resource = %resource.url(), existed, "Resource deleted");
                true
            }
            Err(error) => {
                warn!(resource = %resource.url(), error = %error, "Delete failed");
                false
            }
        }
    }

    /// Executes one page of a query.
    ///
    /// When `known_total` is `None` the total is the count the backend reports
    /// for this page, not a full count. Callers paging through results should
    /// pass the first page's total back on every later request.
    pub async fn query(
        &self,
        query: &str,
        resource_type: &str,
        page_size: u32,
        continuation_token: Option<&str>,
        known_total: Option<i64>,
    ) -> StorageResult<QueryResult> {
        self.registry.require(resource_type)?;
        self.ensure_collection(resource_type).await?;

        let continuation = PageCodec::decode(continuation_token)?;
        let page = self
            .backend
            .query(resource_type, query, page_size, continuation.as_deref())
            .await?;

        let mut resources = Vec::with_capacity(page.documents.len());
        for document in page.documents {
            match self.registry.parse_document(document) {
                Ok(resource) => resources.push(resource),
                Err(error) => warn!(
                    resource_type = %resource_type,
                    error = %error,
                    "Skipping unreadable document in query page"
                ),
            }
        }

        debug!(
            resource_type = %resource_type,
            returned = resources.len(),
            has_more = page.raw_continuation.is_some(),
            "Query page fetched"
        );

        Ok(QueryResult {
            resources,
            total: known_total.unwrap_or(page.count),
            continuation_token: PageCodec::encode(page.raw_continuation.as_deref()),
        })
    }

    /// Returns every recorded version of a resource, newest first.
    pub async fn history(&self, resource_type: &str, id: &str) -> StorageResult<Vec<Resource>> {
        self.history
            .entries(resource_type, id)
            .await?
            .iter()
            .map(|bytes| self.registry.parse_slice(resource_type, bytes))
            .collect()
    }

    /// Reads one recorded version.
    pub async fn vread(
        &self,
        resource_type: &str,
        id: &str,
        version_id: &str,
    ) -> StorageResult<Option<Resource>> {
        match self.history.entry(resource_type, id, version_id).await? {
            Some(bytes) => self.registry.parse_slice(resource_type, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Runs a parsed search request.
    pub async fn search(
        &self,
        resource_type: &str,
        request: &SearchRequest,
    ) -> StorageResult<SearchOutcome> {
        let (matches, total, next_token) = match &request.id {
            Some(id) => {
                let found: Vec<Resource> = self.load(id, resource_type).await.into_iter().collect();
                let total = found.len() as i64;
                (found, total, None)
            }
            None => {
                let query = self.query_builder.build(resource_type, &request.filters);
                debug!(resource_type = %resource_type, query = %query, "Compiled search");
                let page = self
                    .query(
                        &query,
                        resource_type,
                        request.count,
                        request.next_page.as_deref(),
                        request.known_total,
                    )
                    .await?;
                (page.resources, page.total, page.continuation_token)
            }
        };

        let included = self.resolve_includes(&matches, &request.includes).await;

        let entries = matches
            .into_iter()
            .map(|resource| SearchEntry {
                resource,
                mode: SearchEntryMode::Match,
            })
            .chain(included.into_iter().map(|resource| SearchEntry {
                resource,
                mode: SearchEntryMode::Include,
            }))
            .collect();

        Ok(SearchOutcome {
            entries,
            total,
            next_token,
        })
    }

    /// Loads the resources referenced by `includes` from `matches`.
    ///
    /// Unresolvable references are skipped. Each referenced resource appears
    /// once and never duplicates a match.
    pub async fn resolve_includes(
        &self,
        matches: &[Resource],
        includes: &[IncludeDirective],
    ) -> Vec<Resource> {
        let mut seen: HashSet<String> = matches.iter().map(Resource::url).collect();
        let mut included = Vec::new();

        for directive in includes {
            for resource in matches
                .iter()
                .filter(|r| r.resource_type() == directive.source_type)
            {
                for reference in references(resource.body(), &directive.property) {
                    let Some((target_type, target_id)) = split_reference(&reference) else {
                        continue;
                    };
                    let url = format!("{target_type}/{target_id}");
                    if seen.contains(&url) {
                        continue;
                    }
                    if let Some(target) = self.load(target_id, target_type).await {
                        seen.insert(url);
                        included.push(target);
                    }
                }
            }
        }

        included
    }
}

/// Collects `reference` strings from a property, which may be a single
/// Reference or an array of them.
///
/// `substance` is read from `suspectEntity[].instance` (AdverseEvent).
fn references(body: &Value, property: &str) -> Vec<String> {
    let (value, field) = if property == "substance" {
        (body.get("suspectEntity"), Some("instance"))
    } else {
        (body.get(property), None)
    };

    let items: Vec<&Value> = match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item) => vec![item],
        None => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match field {
            Some(field) => item.get(field),
            None => Some(item),
        })
        .filter_map(|reference| reference.get("reference").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Splits `Type/id` (or an absolute URL ending in `Type/id`) into its parts.
fn split_reference(reference: &str) -> Option<(&str, &str)> {
    let reference = reference.split("/_history/").next().unwrap_or(reference);
    let mut parts = reference.rsplit('/');
    let id = parts.next().filter(|s| !s.is_empty())?;
    let resource_type = parts.next().filter(|s| !s.is_empty())?;
    Some((resource_type, id))
}
