//! Pagination types for query results.
//!
//! Backends hand back an opaque, backend-native continuation cursor. The
//! [`PageCodec`] turns it into a URL-safe token so it can travel inside a
//! query parameter and back again.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::types::Resource;

/// Reversible URL-safe encoding for continuation cursors.
///
/// This is a transport encoding, not encryption.
///
/// ```
/// use helios_docstore::types::PageCodec;
///
/// let token = PageCodec::encode(Some("{\"offset\":100}"));
/// assert_eq!(PageCodec::decode(token.as_deref()).unwrap().as_deref(), Some("{\"offset\":100}"));
/// assert_eq!(PageCodec::encode(None), None);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PageCodec;

impl PageCodec {
    /// Encodes raw bytes into a token.
    pub fn encode_bytes(raw: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Decodes a token into raw bytes.
    pub fn decode_bytes(token: &str) -> Result<Vec<u8>, SearchError> {
        URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| SearchError::InvalidCursor {
                cursor: token.to_string(),
            })
    }

    /// Encodes a raw continuation; `None` stays `None`.
    pub fn encode(raw: Option<&str>) -> Option<String> {
        raw.map(|r| Self::encode_bytes(r.as_bytes()))
    }

    /// Decodes a token back to the raw continuation; `None` stays `None`.
    pub fn decode(token: Option<&str>) -> Result<Option<String>, SearchError> {
        let Some(token) = token else {
            return Ok(None);
        };
        let bytes = Self::decode_bytes(token)?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| SearchError::InvalidCursor {
                cursor: token.to_string(),
            })
    }
}

/// One page of query results.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Resources on this page, in backend order.
    pub resources: Vec<Resource>,

    /// Total as supplied by the caller, or the first page's count.
    pub total: i64,

    /// Token for the next page, absent on the last page.
    pub continuation_token: Option<String>,
}

impl QueryResult {
    /// Returns true if there is a further page.
    pub fn has_more(&self) -> bool {
        self.continuation_token.is_some()
    }
}

/// How a search entry was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEntryMode {
    /// This is a match to the search parameters.
    Match,
    /// This is included because of _include.
    Include,
}

/// A resource returned from a search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchEntry {
    /// The resource.
    pub resource: Resource,
    /// Match or include.
    pub mode: SearchEntryMode,
}

/// The assembled result of a search request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    /// Matches followed by includes.
    pub entries: Vec<SearchEntry>,
    /// Total carried across pages.
    pub total: i64,
    /// Token for the next page.
    pub next_token: Option<String>,
}

impl SearchOutcome {
    /// Iterates the matched resources.
    pub fn matches(&self) -> impl Iterator<Item = &Resource> {
        self.entries
            .iter()
            .filter(|e| e.mode == SearchEntryMode::Match)
            .map(|e| &e.resource)
    }

    /// Iterates the included resources.
    pub fn includes(&self) -> impl Iterator<Item = &Resource> {
        self.entries
            .iter()
            .filter(|e| e.mode == SearchEntryMode::Include)
            .map(|e| &e.resource)
    }
}
