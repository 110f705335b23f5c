//! Command handlers.
//!
//! Every handler returns a JSON document for stdout and whether the
//! operation succeeded.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use serde_json::{Value, json};
use tracing::{debug, info};

use helios_docstore::backends::blob_store::ObjectStoreBlobs;
use helios_docstore::core::{HistoryLog, UpsertOutcome};
use helios_docstore::error::ResourceError;
use helios_docstore::types::SearchOutcome;
use helios_docstore::{
    BatchProcessor, EntryReporting, PageCodec, Resource, ResourceTypeRegistry, SearchQueryBuilder,
    SearchRequest, SearchRules, VersionedResourceStore,
};

use crate::config::{CliConfig, Command, parse_params};

/// Result of a command.
#[derive(Debug)]
pub struct CommandOutput {
    /// JSON printed to stdout.
    pub body: Value,
    /// False for conflicts and failed writes.
    pub success: bool,
}

impl CommandOutput {
    fn ok(body: Value) -> Self {
        Self {
            body,
            success: true,
        }
    }
}

/// Runs the configured command.
pub async fn run(config: &CliConfig) -> anyhow::Result<CommandOutput> {
    match &config.command {
        Command::EncodeToken { raw } => Ok(CommandOutput::ok(json!({
            "token": PageCodec::encode(Some(raw))
        }))),
        Command::DecodeToken { token } => {
            let raw = PageCodec::decode(Some(token))?;
            Ok(CommandOutput::ok(json!({ "raw": raw })))
        }
        Command::Compile {
            resource_type,
            params,
        } => {
            let params = parse_params(params).map_err(|e| anyhow!(e))?;
            let builder = SearchQueryBuilder::new(Arc::new(load_rules(config)?), select_all()?);
            Ok(CommandOutput::ok(json!({
                "query": builder.build(resource_type, &params)
            })))
        }
        command => {
            let store = open_store(config).await?;
            run_with_store(&store, command).await
        }
    }
}

async fn run_with_store(
    store: &Arc<VersionedResourceStore>,
    command: &Command,
) -> anyhow::Result<CommandOutput> {
    match command {
        Command::Put { file, if_match } => {
            let resource = read_resource(store.registry(), file)?;
            let outcome = store.upsert(resource, if_match.as_deref()).await;
            Ok(outcome_output(&outcome))
        }
        Command::Get { resource_type, id } => {
            let resource = store
                .load(id, resource_type)
                .await
                .ok_or_else(|| ResourceError::NotFound {
                    resource_type: resource_type.clone(),
                    id: id.clone(),
                })?;
            Ok(CommandOutput::ok(resource.to_document()))
        }
        Command::Delete { resource_type, id } => {
            let target = Resource::new(resource_type.as_str(), json!({})).with_id(id.as_str());
            let deleted = store.delete(&target).await;
            Ok(CommandOutput {
                body: json!({ "deleted": deleted, "resource": target.url() }),
                success: deleted,
            })
        }
        Command::History { resource_type, id } => {
            let versions = store.history(resource_type, id).await?;
            let entries: Vec<Value> = versions
                .iter()
                .map(|r| json!({ "fullUrl": r.versioned_url(), "resource": r.to_document() }))
                .collect();
            Ok(CommandOutput::ok(json!({
                "resourceType": "Bundle",
                "type": "history",
                "total": entries.len(),
                "entry": entries
            })))
        }
        Command::Vread {
            resource_type,
            id,
            version,
        } => {
            let resource = store
                .vread(resource_type, id, version)
                .await?
                .ok_or_else(|| ResourceError::VersionNotFound {
                    resource_type: resource_type.clone(),
                    id: id.clone(),
                    version_id: version.clone(),
                })?;
            Ok(CommandOutput::ok(resource.to_document()))
        }
        Command::Search {
            resource_type,
            params,
        } => {
            let params = parse_params(params).map_err(|e| anyhow!(e))?;
            let request = SearchRequest::parse(&params, store.config())?;
            let outcome = store.search(resource_type, &request).await?;
            Ok(CommandOutput::ok(searchset(resource_type, &request, &outcome)))
        }
        Command::Batch {
            file,
            if_match,
            discard_entries,
        } => {
            let bundle = read_resource(store.registry(), file)?;
            let mut processor = BatchProcessor::new(store.clone());
            if *discard_entries {
                processor = processor.with_reporting(EntryReporting::Discard);
            }
            let response = processor.submit(bundle, if_match.as_deref()).await;
            info!(
                succeeded = response.succeeded(),
                reported = response.entries.len(),
                "Batch submitted"
            );

            let container = outcome_output(&response.container);
            let entries: Vec<Value> = response
                .entries
                .iter()
                .map(|outcome| outcome_output(outcome).body)
                .collect();
            Ok(CommandOutput {
                body: json!({ "container": container.body, "entries": entries }),
                success: container.success,
            })
        }
        Command::Compile { .. } | Command::EncodeToken { .. } | Command::DecodeToken { .. } => {
            bail!("command does not use the store")
        }
    }
}

/// Builds the store described by the configuration.
pub async fn open_store(config: &CliConfig) -> anyhow::Result<Arc<VersionedResourceStore>> {
    let store_config = config.store_config();
    store_config.validate()?;

    let backend = open_backend(&config.database)?;
    let blob_config = config.blob_store_config();
    let blobs = Arc::new(ObjectStoreBlobs::from_config(&blob_config)?);
    let history = HistoryLog::new(blobs.clone())
        .with_prefix(&blob_config.prefix)
        .with_max_entry_bytes(store_config.max_resource_bytes);
    let rules = Arc::new(load_rules(config)?);

    let store = VersionedResourceStore::new(
        backend,
        blobs,
        Arc::new(ResourceTypeRegistry::r4()),
        store_config,
    )
    .with_history(history)
    .with_search_rules(rules);
    store.initialize().await?;

    debug!(database = %config.database, "Store opened");
    Ok(Arc::new(store))
}

#[cfg(feature = "sqlite")]
fn open_backend(database: &str) -> anyhow::Result<Arc<dyn helios_docstore::DocumentBackend>> {
    use helios_docstore::backends::sqlite::SqliteDocumentBackend;

    info!(database = %database, "Opening SQLite document backend");
    let backend = if database == ":memory:" {
        SqliteDocumentBackend::in_memory()?
    } else {
        SqliteDocumentBackend::open(database)?
    };
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "sqlite"))]
fn open_backend(_database: &str) -> anyhow::Result<Arc<dyn helios_docstore::DocumentBackend>> {
    bail!(
        "No document backend is enabled. \
         Build with: cargo build -p helios-docstore-cli --features sqlite"
    )
}

#[cfg(feature = "sqlite")]
fn select_all() -> anyhow::Result<&'static str> {
    Ok(helios_docstore::backends::sqlite::SELECT_ALL_QUERY)
}

#[cfg(not(feature = "sqlite"))]
fn select_all() -> anyhow::Result<&'static str> {
    bail!("Compiling queries requires the 'sqlite' feature")
}

fn load_rules(config: &CliConfig) -> anyhow::Result<SearchRules> {
    match &config.rules {
        Some(path) => Ok(SearchRules::load(path)?),
        None => Ok(SearchRules::embedded()?),
    }
}

fn read_resource(registry: &ResourceTypeRegistry, path: &Path) -> anyhow::Result<Resource> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let document: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(registry.parse_document(document)?)
}

fn outcome_output(outcome: &UpsertOutcome) -> CommandOutput {
    let mut body = json!({ "status": outcome.status() });
    if let Some(resource) = outcome.resource() {
        body["resource"] = resource.to_document();
    }
    if let Some(diagnostic) = outcome.diagnostic() {
        body["diagnostic"] = Value::String(diagnostic);
    }
    CommandOutput {
        body,
        success: outcome.is_success(),
    }
}

fn searchset(resource_type: &str, request: &SearchRequest, outcome: &SearchOutcome) -> Value {
    let entries: Vec<Value> = outcome
        .entries
        .iter()
        .map(|entry| {
            json!({
                "fullUrl": entry.resource.url(),
                "resource": entry.resource.to_document(),
                "search": { "mode": entry.mode }
            })
        })
        .collect();

    let mut bundle = json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": outcome.total,
        "entry": entries
    });

    if let Some(token) = &outcome.next_token {
        let query: Vec<String> = request
            .next_page_params(token, outcome.total)
            .into_iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        bundle["link"] = json!([{
            "relation": "next",
            "url": format!("{}?{}", resource_type, query.join("&"))
        }]);
    }

    bundle
}
