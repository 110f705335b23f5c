//! Optimistic concurrency helpers.
//!
//! Conditional writes compare a caller-supplied version (usually taken from an
//! `If-Match` header) against the version currently stored. The comparison is
//! a read followed by a write, so it only guards against stale overwrites on a
//! best-effort basis; concurrent writers to the same key still race at the
//! backend, which applies last-write-wins.

use serde::Serialize;

use crate::error::{ConcurrencyError, StorageError};

/// Information about a version conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionConflictInfo {
    /// The resource type.
    pub resource_type: String,
    /// The resource ID.
    pub id: String,
    /// The version that was expected.
    pub expected_version: String,
    /// The version currently stored, `None` if no resource exists.
    pub actual_version: Option<String>,
}

impl VersionConflictInfo {
    /// Creates a new version conflict info.
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        expected_version: impl Into<String>,
        actual_version: Option<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            expected_version: expected_version.into(),
            actual_version,
        }
    }

    /// Human-readable diagnostic naming the current version.
    pub fn diagnostic(&self) -> String {
        match &self.actual_version {
            Some(actual) => format!(
                "Version conflict: current version of {}/{} is {}",
                self.resource_type, self.id, actual
            ),
            None => format!(
                "Version conflict: {}/{} does not exist",
                self.resource_type, self.id
            ),
        }
    }

    /// Converts this info into a storage error.
    pub fn into_error(self) -> StorageError {
        StorageError::Concurrency(ConcurrencyError::VersionConflict {
            resource_type: self.resource_type,
            id: self.id,
            expected_version: self.expected_version,
            actual_version: self.actual_version,
        })
    }
}

/// Checks an expected version against the stored one.
///
/// A missing resource never matches.
pub fn check_version_match(
    resource_type: &str,
    id: &str,
    expected: &str,
    actual: Option<&str>,
) -> Result<(), VersionConflictInfo> {
    match actual {
        Some(actual) if actual == expected => Ok(()),
        _ => Err(VersionConflictInfo::new(
            resource_type,
            id,
            expected,
            actual.map(str::to_string),
        )),
    }
}

/// Normalizes an ETag value for comparison.
///
/// ETags may be formatted as `W/"abc"`, `"abc"`, or just `abc`.
pub fn normalize_etag(etag: &str) -> &str {
    etag.trim()
        .trim_start_matches("W/")
        .trim_start_matches('"')
        .trim_end_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_names_current_version() {
        let info = VersionConflictInfo::new("Patient", "123", "a", Some("b".to_string()));
        assert_eq!(
            info.diagnostic(),
            "Version conflict: current version of Patient/123 is b"
        );

        let info = VersionConflictInfo::new("Patient", "123", "a", None);
        assert!(info.diagnostic().contains("does not exist"));
    }

    #[test]
    fn test_version_conflict_into_error() {
        let info = VersionConflictInfo::new("Patient", "123", "a", Some("b".to_string()));
        let error = info.into_error();
        assert!(matches!(error, StorageError::Concurrency(_)));
    }

    #[test]
    fn test_check_version_match() {
        assert!(check_version_match("Patient", "123", "v1", Some("v1")).is_ok());

        let conflict = check_version_match("Patient", "123", "v1", Some("v2")).unwrap_err();
        assert_eq!(conflict.actual_version.as_deref(), Some("v2"));

        let conflict = check_version_match("Patient", "123", "v1", None).unwrap_err();
        assert_eq!(conflict.actual_version, None);
    }

    #[test]
    fn test_normalize_etag() {
        assert_eq!(normalize_etag("W/\"1\""), "1");
        assert_eq!(normalize_etag("\"1\""), "1");
        assert_eq!(normalize_etag("1"), "1");
        assert_eq!(normalize_etag(" W/\"abc\" "), "abc");
    }
}
