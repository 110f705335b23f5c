//! Store-wide configuration.
//!
//! [`DocStoreConfig`] is built once at startup and handed to the components
//! that need it. There is no global configuration state.

use serde::{Deserialize, Serialize};

use crate::error::{StorageResult, ValidationError};

/// Maximum serialized size of a single resource version.
pub const DEFAULT_MAX_RESOURCE_BYTES: usize = 500_000;

/// How a batch submission reports the outcomes of its individual entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryReporting {
    /// Every entry outcome is returned to the caller.
    #[default]
    Report,
    /// Entries are processed but only the container outcome is returned.
    Discard,
}

/// Configuration for [`VersionedResourceStore`](crate::core::VersionedResourceStore)
/// and the components it drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocStoreConfig {
    /// Size cap for the serialized history form of a resource.
    #[serde(default = "default_max_resource_bytes")]
    pub max_resource_bytes: usize,

    /// Page size used when a search does not supply `_count`.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Upper bound applied to `_count`.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Batch entry reporting mode.
    #[serde(default)]
    pub entry_reporting: EntryReporting,
}

impl Default for DocStoreConfig {
    fn default() -> Self {
        Self {
            max_resource_bytes: default_max_resource_bytes(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            entry_reporting: EntryReporting::default(),
        }
    }
}

fn default_max_resource_bytes() -> usize {
    DEFAULT_MAX_RESOURCE_BYTES
}

fn default_page_size() -> u32 {
    100
}

fn default_max_page_size() -> u32 {
    1000
}

impl DocStoreConfig {
    /// Validates configuration invariants.
    pub fn validate(&self) -> StorageResult<()> {
        if self.max_resource_bytes == 0 {
            return Err(invalid("max_resource_bytes must be > 0"));
        }

        if self.default_page_size == 0 {
            return Err(invalid("default_page_size must be > 0"));
        }

        if self.max_page_size < self.default_page_size {
            return Err(invalid("max_page_size must be >= default_page_size"));
        }

        Ok(())
    }

    /// Clamps a requested page size to `1..=max_page_size`.
    pub fn clamp_page_size(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_page_size)
    }
}

fn invalid(message: &str) -> crate::error::StorageError {
    ValidationError::InvalidConfiguration {
        message: message.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DocStoreConfig::default();
        assert_eq!(config.max_resource_bytes, 500_000);
        assert_eq!(config.default_page_size, 100);
        assert_eq!(config.entry_reporting, EntryReporting::Report);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: DocStoreConfig =
            serde_json::from_str(r#"{"entry_reporting":"discard"}"#).unwrap();
        assert_eq!(config.entry_reporting, EntryReporting::Discard);
        assert_eq!(config.max_resource_bytes, DEFAULT_MAX_RESOURCE_BYTES);
    }

    #[test]
    fn test_validate_rejects_zero_size_cap() {
        let config = DocStoreConfig {
            max_resource_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_page_sizes() {
        let config = DocStoreConfig {
            default_page_size: 50,
            max_page_size: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_page_size() {
        let config = DocStoreConfig::default();
        assert_eq!(config.clamp_page_size(0), 1);
        assert_eq!(config.clamp_page_size(25), 25);
        assert_eq!(config.clamp_page_size(50_000), 1000);
    }
}
