//! SQLite document backend.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::{BackendKind, DocumentBackend, DocumentPage, UpsertAck};
use crate::error::{BackendError, SearchError, StorageError, StorageResult, ValidationError};

use super::schema;

/// Query selecting every document of a collection, aliased as `c`.
pub const SELECT_ALL_QUERY: &str = "SELECT DISTINCT c.id, c.body FROM c";

/// SQLite implementation of [`DocumentBackend`].
///
/// Each collection is a table `(id, body, last_modified)`. Queries run against
/// a `c` view of the collection table and must return a `body` column.
pub struct SqliteDocumentBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteDocumentBackendConfig,
    path: String,
    is_memory: bool,
}

impl Debug for SqliteDocumentBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDocumentBackend")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite document backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteDocumentBackendConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for file databases.
    #[serde(default = "default_true")]
    pub enable_wal: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteDocumentBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
        }
    }
}

impl SqliteDocumentBackend {
    /// Creates a backend over a private in-memory database.
    ///
    /// The pool holds a single connection because every in-memory
    /// connection would otherwise open its own empty database.
    pub fn in_memory() -> StorageResult<Self> {
        let config = SqliteDocumentBackendConfig {
            max_connections: 1,
            min_connections: 1,
            enable_wal: false,
            ..Default::default()
        };
        Self::with_config(":memory:", config)
    }

    /// Opens or creates a database file with the default configuration.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteDocumentBackendConfig::default())
    }

    /// Creates a backend with custom configuration.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteDocumentBackendConfig,
    ) -> StorageResult<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let is_memory = path_str == ":memory:";

        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let enable_wal = config.enable_wal && !is_memory;
        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path.as_ref())
        }
        .with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if enable_wal {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })?;
            }
            Ok(())
        });

        let max_size = if is_memory { 1 } else { config.max_connections };
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(config.min_connections.min(max_size)))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)?;

        Ok(Self {
            pool,
            config,
            path: path_str,
            is_memory,
        })
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteDocumentBackendConfig {
        &self.config
    }

    /// Returns true for an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Lists the collections created so far.
    pub fn collections(&self) -> StorageResult<Vec<String>> {
        let conn = self.get_connection()?;
        schema::list_collections(&conn)
    }

    fn get_connection(&self) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }
}

/// Rejects collection names that cannot be used verbatim as table names.
fn validate_collection(collection: &str) -> StorageResult<()> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidResource {
            message: format!("invalid collection name: {:?}", collection),
        }
        .into())
    }
}

fn query_error(err: rusqlite::Error) -> StorageError {
    StorageError::Backend(BackendError::QueryError {
        message: err.to_string(),
    })
}

fn parse_offset(continuation: Option<&str>) -> StorageResult<u64> {
    match continuation {
        None => Ok(0),
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            SearchError::InvalidCursor {
                cursor: raw.to_string(),
            }
            .into()
        }),
    }
}

#[async_trait]
impl DocumentBackend for SqliteDocumentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn select_all_query(&self) -> &str {
        SELECT_ALL_QUERY
    }

    async fn initialize(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)?;
        info!(path = %self.path, memory = self.is_memory, "SQLite document backend initialized");
        Ok(())
    }

    async fn create_collection_if_absent(&self, collection: &str) -> StorageResult<()> {
        validate_collection(collection)?;
        let conn = self.get_connection()?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        schema::create_collection(&conn, collection, &now)?;
        debug!(collection, "collection ready");
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        document: &[u8],
    ) -> StorageResult<UpsertAck> {
        validate_collection(collection)?;
        let body = std::str::from_utf8(document).map_err(|e| BackendError::SerializationError {
            message: e.to_string(),
        })?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        let existed: bool = tx.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM \"{collection}\" WHERE id = ?1)"),
            [id],
            |row| row.get(0),
        )?;
        tx.execute(
            &format!(
                "INSERT INTO \"{collection}\" (id, body, last_modified) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET body = excluded.body, last_modified = excluded.last_modified"
            ),
            params![id, body, now],
        )?;
        tx.commit()?;

        Ok(UpsertAck { created: !existed })
    }

    async fn read(&self, collection: &str, id: &str) -> StorageResult<Option<Value>> {
        validate_collection(collection)?;
        let conn = self.get_connection()?;
        let body: Option<String> = conn
            .query_row(
                &format!("SELECT body FROM \"{collection}\" WHERE id = ?1"),
                [id],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
        validate_collection(collection)?;
        let conn = self.get_connection()?;
        let affected = conn.execute(
            &format!("DELETE FROM \"{collection}\" WHERE id = ?1"),
            [id],
        )?;
        Ok(affected > 0)
    }

    async fn query(
        &self,
        collection: &str,
        query: &str,
        page_size: u32,
        continuation: Option<&str>,
    ) -> StorageResult<DocumentPage> {
        validate_collection(collection)?;
        let offset = parse_offset(continuation)?;
        let page_size = u64::from(page_size.max(1));

        // One extra row tells us whether another page exists.
        let sql = format!(
            "WITH c AS (SELECT id, body FROM \"{collection}\") \
             SELECT q.body FROM ({query}) AS q ORDER BY q.id LIMIT ?1 OFFSET ?2"
        );
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&sql).map_err(query_error)?;
        let rows = stmt
            .query_map(params![(page_size + 1) as i64, offset as i64], |row| {
                row.get::<_, String>(0)
            })
            .map_err(query_error)?;

        let mut bodies = Vec::new();
        for row in rows {
            bodies.push(row.map_err(query_error)?);
        }

        let has_more = bodies.len() as u64 > page_size;
        bodies.truncate(page_size as usize);

        let documents = bodies
            .iter()
            .map(|body| serde_json::from_str::<Value>(body))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            collection,
            offset,
            returned = documents.len(),
            has_more,
            "query page"
        );

        Ok(DocumentPage {
            count: documents.len() as i64,
            raw_continuation: has_more.then(|| (offset + page_size).to_string()),
            documents,
        })
    }
}
