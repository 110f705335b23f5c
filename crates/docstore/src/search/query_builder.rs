//! Compiles search parameters into a backend query string.
//!
//! This is textual template substitution, not a parser. Values are spliced
//! into rule templates verbatim and the result is never checked against the
//! backend grammar; a bad template or value produces a query the backend
//! rejects when it runs.

use std::sync::Arc;

use crate::core::DocumentBackend;
use crate::search::rules::SearchRules;

/// Builds query strings from a [`SearchRules`] table.
#[derive(Debug, Clone)]
pub struct SearchQueryBuilder {
    rules: Arc<SearchRules>,
    select_all: String,
}

impl SearchQueryBuilder {
    /// Creates a builder over a rule table and a select-all template.
    pub fn new(rules: Arc<SearchRules>, select_all: impl Into<String>) -> Self {
        Self {
            rules,
            select_all: select_all.into(),
        }
    }

    /// Creates a builder using the backend's select-all template.
    pub fn for_backend(rules: Arc<SearchRules>, backend: &dyn DocumentBackend) -> Self {
        Self::new(rules, backend.select_all_query())
    }

    /// Returns the rule table.
    pub fn rules(&self) -> &SearchRules {
        &self.rules
    }

    /// Compiles `params` for `resource_type`.
    ///
    /// Parameters without a rule are skipped. A join clause is added at most
    /// once. Comma-separated values become `OR` alternatives within one
    /// parenthesized group, and groups for different parameters are joined
    /// with `AND`.
    pub fn build<K, V>(&self, resource_type: &str, params: &[(K, V)]) -> String
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut select = self.select_all.clone();
        let mut groups: Vec<String> = Vec::new();

        for (name, value) in params {
            let Some(rule) = self.rules.rule(resource_type, name.as_ref()) else {
                continue;
            };

            if let Some(join) = rule.join_clause.as_deref() {
                if !select.contains(join) {
                    select.push(' ');
                    select.push_str(join);
                }
            }

            let Some(template) = rule.default_template.as_deref() else {
                continue;
            };

            let alternatives: Vec<String> = value
                .as_ref()
                .split(',')
                .map(|group| bind_positional(template, group))
                .collect();
            groups.push(format!("({})", alternatives.join(" OR ")));
        }

        let mut query = select;
        for (index, group) in groups.iter().enumerate() {
            query.push_str(if index == 0 { " WHERE " } else { " AND " });
            query.push_str(group);
        }
        query
    }
}

/// Replaces `~v0~`, `~v1~`, ... with the `|`-separated parts of `group`.
fn bind_positional(template: &str, group: &str) -> String {
    group
        .split('|')
        .enumerate()
        .fold(template.to_string(), |acc, (position, token)| {
            acc.replace(&format!("~v{position}~"), token)
        })
}
