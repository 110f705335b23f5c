//! Batch processing.
//!
//! A batch container is stored as a resource in its own right, then each of
//! its entries is upserted independently, strictly in input order. There is
//! no atomicity across entries: a failed entry neither stops the entries
//! after it nor undoes the entries before it.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::EntryReporting;
use crate::core::store::{UpsertOutcome, VersionedResourceStore};
use crate::error::{StorageError, ValidationError};
use crate::types::{Resource, ResourceKind};

/// Bundle type whose entries are decomposed.
pub const BATCH_BUNDLE_TYPE: &str = "batch";

/// Result of [`BatchProcessor::submit`].
#[derive(Debug)]
pub struct BatchResponse {
    /// Outcome for the container itself.
    pub container: UpsertOutcome,
    /// Outcomes for the entries in input order. Empty under
    /// [`EntryReporting::Discard`].
    pub entries: Vec<UpsertOutcome>,
}

impl BatchResponse {
    /// Number of entries that were stored.
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.is_success()).count()
    }
}

enum PendingEntry {
    Ready(Resource),
    Rejected(Resource, StorageError),
}

/// Drives batch entries through a [`VersionedResourceStore`].
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    store: Arc<VersionedResourceStore>,
    reporting: EntryReporting,
}

impl BatchProcessor {
    /// Creates a processor using the store's configured reporting mode.
    pub fn new(store: Arc<VersionedResourceStore>) -> Self {
        let reporting = store.config().entry_reporting;
        Self { store, reporting }
    }

    /// Overrides the reporting mode.
    pub fn with_reporting(mut self, reporting: EntryReporting) -> Self {
        self.reporting = reporting;
        self
    }

    /// Returns the reporting mode.
    pub fn reporting(&self) -> EntryReporting {
        self.reporting
    }

    /// Upserts each resource in order and returns every outcome.
    pub async fn submit_entries(&self, entries: Vec<Resource>) -> Vec<UpsertOutcome> {
        self.process(entries.into_iter().map(PendingEntry::Ready).collect())
            .await
    }

    /// Stores a container and, for a `batch` bundle, each of its entries.
    ///
    /// Entries are skipped if the container itself hit a version conflict.
    pub async fn submit(&self, bundle: Resource, if_match: Option<&str>) -> BatchResponse {
        let pending = if self.is_batch(&bundle) {
            self.decompose(&bundle)
        } else {
            Vec::new()
        };

        let container = self.store.upsert(bundle, if_match).await;
        if matches!(container, UpsertOutcome::Conflict(_)) {
            return BatchResponse {
                container,
                entries: Vec::new(),
            };
        }

        let entries = self.process(pending).await;
        let entries = match self.reporting {
            EntryReporting::Report => entries,
            EntryReporting::Discard => Vec::new(),
        };

        BatchResponse { container, entries }
    }

    fn is_batch(&self, bundle: &Resource) -> bool {
        let is_container = self
            .store
            .registry()
            .get(bundle.resource_type())
            .is_some_and(|d| d.kind() == ResourceKind::Container);

        is_container
            && bundle.body().get("type").and_then(Value::as_str) == Some(BATCH_BUNDLE_TYPE)
    }

    fn decompose(&self, bundle: &Resource) -> Vec<PendingEntry> {
        let Some(entries) = bundle.body().get("entry").and_then(Value::as_array) else {
            return Vec::new();
        };

        entries
            .iter()
            .map(|entry| match entry.get("resource") {
                Some(document) => match self.store.registry().parse_document(document.clone()) {
                    Ok(resource) => PendingEntry::Ready(resource),
                    Err(error) => {
                        let resource_type = document
                            .get("resourceType")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        PendingEntry::Rejected(
                            Resource::new(resource_type, document.clone()),
                            error,
                        )
                    }
                },
                None => PendingEntry::Rejected(
                    Resource::new("", entry.clone()),
                    ValidationError::MissingRequiredField {
                        field: "entry.resource".to_string(),
                    }
                    .into(),
                ),
            })
            .collect()
    }

    async fn process(&self, entries: Vec<PendingEntry>) -> Vec<UpsertOutcome> {
        let total = entries.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, entry) in entries.into_iter().enumerate() {
            let outcome = match entry {
                PendingEntry::Ready(resource) => self.store.upsert(resource, None).await,
                PendingEntry::Rejected(resource, error) => UpsertOutcome::Error { resource, error },
            };
            debug!(index, status = ?outcome.status(), "Batch entry processed");
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(total, succeeded, failed = total - succeeded, "Batch processed");
        outcomes
    }
}
