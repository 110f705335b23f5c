//! Search request parsing.
//!
//! Splits an ordered parameter list into the control parameters the store
//! handles itself and the filter parameters handed to the query builder.
//!
//! | Parameter | Meaning |
//! |-----------|---------|
//! | `_id` | Load a single resource directly |
//! | `_count` | Page size (default from config, capped by `max_page_size`) |
//! | `_nextpage` | Continuation token from a previous page |
//! | `_querytotal` | Total carried from the first page; negative means unknown |
//! | `_include` | `Type:property` reference to resolve; repeatable |

use serde::Serialize;

use crate::config::DocStoreConfig;
use crate::error::{StorageResult, ValidationError};

/// Control parameter names.
pub mod params {
    /// Direct id lookup.
    pub const ID: &str = "_id";
    /// Page size.
    pub const COUNT: &str = "_count";
    /// Continuation token.
    pub const NEXT_PAGE: &str = "_nextpage";
    /// Known total.
    pub const QUERY_TOTAL: &str = "_querytotal";
    /// Include directive.
    pub const INCLUDE: &str = "_include";
}

/// A parsed `_include=Type:property` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludeDirective {
    /// The resource type the directive applies to.
    pub source_type: String,
    /// The reference property to follow.
    pub property: String,
}

impl IncludeDirective {
    /// Parses `Type:property`.
    pub fn parse(value: &str) -> StorageResult<Self> {
        match value.split_once(':') {
            Some((source_type, property)) if !source_type.is_empty() && !property.is_empty() => {
                Ok(Self {
                    source_type: source_type.to_string(),
                    property: property.to_string(),
                })
            }
            _ => Err(ValidationError::InvalidSearchParameter {
                parameter: params::INCLUDE.to_string(),
                message: format!("expected Type:property, got '{value}'"),
            }
            .into()),
        }
    }
}

/// A parsed search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    /// Direct id lookup, bypassing the query builder.
    pub id: Option<String>,
    /// Page size.
    pub count: u32,
    /// Continuation token for the requested page.
    pub next_page: Option<String>,
    /// Total carried from the first page.
    pub known_total: Option<i64>,
    /// Include directives.
    pub includes: Vec<IncludeDirective>,
    /// Remaining parameters, in request order.
    pub filters: Vec<(String, String)>,
}

impl SearchRequest {
    /// Parses an ordered parameter list.
    pub fn parse<K, V>(query: &[(K, V)], config: &DocStoreConfig) -> StorageResult<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = SearchRequest {
            id: None,
            count: config.default_page_size,
            next_page: None,
            known_total: None,
            includes: Vec::new(),
            filters: Vec::new(),
        };

        for (name, value) in query {
            let (name, value) = (name.as_ref(), value.as_ref());
            match name {
                params::ID => request.id = non_empty(value),
                params::COUNT => {
                    let count = parse_number::<u32>(name, value)?;
                    request.count = config.clamp_page_size(count);
                }
                params::NEXT_PAGE => request.next_page = non_empty(value),
                params::QUERY_TOTAL => {
                    let total = parse_number::<i64>(name, value)?;
                    request.known_total = (total >= 0).then_some(total);
                }
                params::INCLUDE => request.includes.push(IncludeDirective::parse(value)?),
                _ => request
                    .filters
                    .push((name.to_string(), value.to_string())),
            }
        }

        Ok(request)
    }

    /// Parameters that request the page after this one.
    ///
    /// The total is fixed so later pages report the same value as the first.
    pub fn next_page_params(&self, next_token: &str, total: i64) -> Vec<(String, String)> {
        let mut out = self.filters.clone();
        for include in &self.includes {
            out.push((
                params::INCLUDE.to_string(),
                format!("{}:{}", include.source_type, include.property),
            ));
        }
        out.push((params::COUNT.to_string(), self.count.to_string()));
        out.push((params::QUERY_TOTAL.to_string(), total.to_string()));
        out.push((params::NEXT_PAGE.to_string(), next_token.to_string()));
        out
    }
}

fn non_empty(value: &str) -> Option<String> {
    Some(value.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> StorageResult<T> {
    value.trim().parse::<T>().map_err(|_| {
        ValidationError::InvalidSearchParameter {
            parameter: name.to_string(),
            message: format!("'{value}' is not a valid number"),
        }
        .into()
    })
}
