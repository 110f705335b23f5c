//! Command-line configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DOCSTORE_LOG_LEVEL` | info | Log level |
//! | `DOCSTORE_DATABASE` | docstore.db | SQLite database file, or `:memory:` |
//! | `DOCSTORE_HISTORY_DIR` | ./history | Local directory for history entries |
//! | `DOCSTORE_HISTORY_PREFIX` | fhirhistory | Key prefix for history entries |
//! | `DOCSTORE_HISTORY_BUCKET` | - | S3 bucket for history (replaces the local directory) |
//! | `DOCSTORE_HISTORY_REGION` | - | S3 region |
//! | `DOCSTORE_HISTORY_ENDPOINT` | - | S3-compatible endpoint URL |
//! | `DOCSTORE_HISTORY_ALLOW_HTTP` | false | Allow an `http://` endpoint |
//! | `DOCSTORE_SEARCH_RULES` | embedded | Search rule file |
//! | `DOCSTORE_MAX_RESOURCE_BYTES` | 500000 | Size cap per resource version |
//! | `DOCSTORE_DEFAULT_PAGE_SIZE` | 100 | Page size when `_count` is absent |
//! | `DOCSTORE_MAX_PAGE_SIZE` | 1000 | Upper bound for `_count` |

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use helios_docstore::DocStoreConfig;
use helios_docstore::backends::blob_store::{BlobStoreConfig, BlobStoreKind};
use helios_docstore::config::{DEFAULT_MAX_RESOURCE_BYTES, EntryReporting};
use helios_docstore::core::DEFAULT_HISTORY_PREFIX;

/// Command-line configuration for the document store.
#[derive(Debug, Clone, Parser)]
#[command(name = "docstore")]
#[command(about = "Versioned FHIR document store", version)]
pub struct CliConfig {
    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "DOCSTORE_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// SQLite database file, or `:memory:`.
    #[arg(long, env = "DOCSTORE_DATABASE", default_value = "docstore.db", global = true)]
    pub database: String,

    /// Directory holding history entries.
    #[arg(long, env = "DOCSTORE_HISTORY_DIR", default_value = "./history", global = true)]
    pub history_dir: PathBuf,

    /// Key prefix for history entries.
    #[arg(
        long,
        env = "DOCSTORE_HISTORY_PREFIX",
        default_value = DEFAULT_HISTORY_PREFIX,
        global = true
    )]
    pub history_prefix: String,

    /// S3 bucket for history entries.
    #[arg(long, env = "DOCSTORE_HISTORY_BUCKET", global = true)]
    pub history_bucket: Option<String>,

    /// S3 region for the history bucket.
    #[arg(long, env = "DOCSTORE_HISTORY_REGION", global = true)]
    pub history_region: Option<String>,

    /// S3-compatible endpoint URL for the history bucket.
    #[arg(long, env = "DOCSTORE_HISTORY_ENDPOINT", global = true)]
    pub history_endpoint: Option<String>,

    /// Allow an `http://` history endpoint.
    #[arg(long, env = "DOCSTORE_HISTORY_ALLOW_HTTP", global = true)]
    pub history_allow_http: bool,

    /// Search rule file. The embedded rules are used when unset.
    #[arg(long, env = "DOCSTORE_SEARCH_RULES", global = true)]
    pub rules: Option<PathBuf>,

    /// Size cap in bytes for one serialized resource version.
    #[arg(
        long,
        env = "DOCSTORE_MAX_RESOURCE_BYTES",
        default_value_t = DEFAULT_MAX_RESOURCE_BYTES,
        global = true
    )]
    pub max_resource_bytes: usize,

    /// Page size when a search has no `_count`.
    #[arg(long, env = "DOCSTORE_DEFAULT_PAGE_SIZE", default_value = "100", global = true)]
    pub default_page_size: u32,

    /// Upper bound for `_count`.
    #[arg(long, env = "DOCSTORE_MAX_PAGE_SIZE", default_value = "1000", global = true)]
    pub max_page_size: u32,

    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Operations.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create or update the resource in a JSON file.
    Put {
        /// Path to the resource JSON.
        file: PathBuf,
        /// Only write if the stored version equals this one.
        #[arg(long)]
        if_match: Option<String>,
    },

    /// Read the current version of a resource.
    Get {
        /// Resource type.
        resource_type: String,
        /// Logical id.
        id: String,
    },

    /// Delete the live copy of a resource. History is kept.
    Delete {
        /// Resource type.
        resource_type: String,
        /// Logical id.
        id: String,
    },

    /// List every recorded version of a resource, newest first.
    History {
        /// Resource type.
        resource_type: String,
        /// Logical id.
        id: String,
    },

    /// Read one recorded version.
    Vread {
        /// Resource type.
        resource_type: String,
        /// Logical id.
        id: String,
        /// Version id.
        version: String,
    },

    /// Search with `name=value` parameters.
    Search {
        /// Resource type.
        resource_type: String,
        /// Search parameters, e.g. `family=Smith,Jones` or `_count=10`.
        params: Vec<String>,
    },

    /// Submit a batch bundle.
    Batch {
        /// Path to the bundle JSON.
        file: PathBuf,
        /// Only write the bundle if its stored version equals this one.
        #[arg(long)]
        if_match: Option<String>,
        /// Process entries without reporting their outcomes.
        #[arg(long)]
        discard_entries: bool,
    },

    /// Print the query compiled for a set of search parameters.
    Compile {
        /// Resource type.
        resource_type: String,
        /// Search parameters.
        params: Vec<String>,
    },

    /// Encode a raw continuation as a page token.
    EncodeToken {
        /// Raw backend continuation.
        raw: String,
    },

    /// Decode a page token back to the raw continuation.
    DecodeToken {
        /// Page token.
        token: String,
    },
}

impl CliConfig {
    /// Validates the configuration and returns any errors.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.trim().is_empty() {
            errors.push("Database path cannot be empty".to_string());
        }

        if self.max_resource_bytes == 0 {
            errors.push("Max resource bytes cannot be 0".to_string());
        }

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if let Err(err) = self.blob_store_config().validate() {
            errors.push(format!("History storage: {}", err));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Store configuration derived from the flags.
    pub fn store_config(&self) -> DocStoreConfig {
        DocStoreConfig {
            max_resource_bytes: self.max_resource_bytes,
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
            entry_reporting: EntryReporting::Report,
        }
    }

    /// History storage configuration derived from the flags.
    ///
    /// A bucket selects S3; otherwise entries go to `history_dir`.
    pub fn blob_store_config(&self) -> BlobStoreConfig {
        let kind = match &self.history_bucket {
            Some(bucket) => BlobStoreKind::S3 {
                bucket: bucket.clone(),
                region: self.history_region.clone(),
                endpoint: self.history_endpoint.clone(),
                allow_http: self.history_allow_http,
            },
            None => BlobStoreKind::Local {
                root: self.history_dir.clone(),
            },
        };

        BlobStoreConfig {
            kind,
            prefix: self.history_prefix.clone(),
        }
    }
}

/// Splits `name=value` arguments at the first `=`.
pub fn parse_params(raw: &[String]) -> Result<Vec<(String, String)>, String> {
    raw.iter()
        .map(|param| match param.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
            _ => Err(format!("expected name=value, got '{}'", param)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        CliConfig::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["docstore", "get", "Patient", "p1"]);
        assert_eq!(config.database, "docstore.db");
        assert_eq!(config.history_prefix, "fhirhistory");
        assert_eq!(config.max_resource_bytes, 500_000);
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.command,
            Command::Get { ref resource_type, ref id } if resource_type == "Patient" && id == "p1"
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let config = parse(&[
            "docstore",
            "search",
            "Patient",
            "family=Smith",
            "_count=5",
            "--database",
            ":memory:",
        ]);
        assert_eq!(config.database, ":memory:");
        let Command::Search { params, .. } = config.command else {
            panic!("expected search");
        };
        assert_eq!(params, vec!["family=Smith", "_count=5"]);
    }

    #[test]
    fn test_batch_flags() {
        let config = parse(&["docstore", "batch", "bundle.json", "--discard-entries"]);
        assert!(matches!(
            config.command,
            Command::Batch {
                discard_entries: true,
                if_match: None,
                ..
            }
        ));
    }

    #[test]
    fn test_validate_page_sizes() {
        let mut config = parse(&["docstore", "encode-token", "x"]);
        config.default_page_size = 500;
        config.max_page_size = 100;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("page size")));
    }

    #[test]
    fn test_bucket_selects_s3() {
        let mut config = parse(&["docstore", "decode-token", "eA"]);
        assert!(matches!(
            config.blob_store_config().kind,
            BlobStoreKind::Local { .. }
        ));

        config.history_bucket = Some("history".to_string());
        config.history_endpoint = Some("http://127.0.0.1:9000".to_string());
        assert!(config.validate().is_err());

        config.history_allow_http = true;
        assert!(matches!(
            config.blob_store_config().kind,
            BlobStoreKind::S3 { allow_http: true, .. }
        ));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_params() {
        let raw = vec!["family=Smith,Jones".to_string(), "url=a=b".to_string()];
        assert_eq!(
            parse_params(&raw).unwrap(),
            vec![
                ("family".to_string(), "Smith,Jones".to_string()),
                ("url".to_string(), "a=b".to_string())
            ]
        );
        assert!(parse_params(&["novalue".to_string()]).is_err());
        assert!(parse_params(&["=x".to_string()]).is_err());
    }
}
