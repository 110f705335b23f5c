//! Search parameter rule table.
//!
//! Rules come from a line-oriented `name=value` source. Lines starting with
//! `#` are comments and lines without `=` are ignored. The key is everything
//! before the first `=`:
//!
//! ```text
//! # parameter registration
//! Patient.family=string
//! # clause appended once to the select when the parameter is used
//! Patient.family.join=JOIN json_each(c.body, '$.name') AS pname
//! # where template, ~v0~ ~v1~ ... are replaced by '|'-separated values
//! Patient.family.default=json_extract(pname.value, '$.family') = '~v0~'
//! ```
//!
//! The table is built once at startup and shared read-only through an `Arc`.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::{BackendError, SearchError, StorageError, StorageResult};

const EMBEDDED_RULES: &str = include_str!("default_rules.txt");

const JOIN_SUFFIX: &str = ".join";
const DEFAULT_SUFFIX: &str = ".default";

/// A fully resolved rule for one search parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParamRule {
    /// The resource type.
    pub resource_type: String,
    /// The search parameter name.
    pub param_name: String,
    /// Base rule value. Its presence is what registers the parameter.
    pub where_template: String,
    /// Clause appended once to the select clause.
    pub join_clause: Option<String>,
    /// Where template with positional placeholders.
    pub default_template: Option<String>,
}

/// Immutable mapping table keyed by `{Type}.{param}[.join|.default]`.
#[derive(Debug, Clone, Default)]
pub struct SearchRules {
    entries: HashMap<String, String>,
}

impl SearchRules {
    /// Parses a rule source.
    ///
    /// Fails on an empty key or a key defined twice.
    pub fn parse(source: &str) -> Result<Self, SearchError> {
        let mut entries = HashMap::new();

        for (index, line) in source.lines().enumerate() {
            if line.starts_with('#') {
                continue;
            }
            let Some((name, value)) = line.split_once('=') else {
                continue;
            };

            let name = name.trim();
            if name.is_empty() {
                return Err(SearchError::RuleParse {
                    line: index + 1,
                    message: "empty rule name".to_string(),
                });
            }
            if entries
                .insert(name.to_string(), value.trim().to_string())
                .is_some()
            {
                return Err(SearchError::RuleParse {
                    line: index + 1,
                    message: format!("duplicate rule '{name}'"),
                });
            }
        }

        Ok(Self { entries })
    }

    /// Reads and parses a rule file.
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Backend(BackendError::from(e)))?;
        let rules = Self::parse(&source)?;
        info!(path = %path.display(), rules = rules.len(), "Loaded search rules");
        Ok(rules)
    }

    /// The rule set shipped with the crate, written for the SQLite backend.
    pub fn embedded() -> Result<Self, SearchError> {
        Self::parse(EMBEDDED_RULES)
    }

    /// Returns the raw value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Resolves the rule for a parameter, if it is registered.
    pub fn rule(&self, resource_type: &str, param_name: &str) -> Option<SearchParamRule> {
        let base = format!("{resource_type}.{param_name}");
        let where_template = self.get(&base)?.to_string();
        Some(SearchParamRule {
            resource_type: resource_type.to_string(),
            param_name: param_name.to_string(),
            where_template,
            join_clause: self.get(&format!("{base}{JOIN_SUFFIX}")).map(str::to_string),
            default_template: self
                .get(&format!("{base}{DEFAULT_SUFFIX}"))
                .map(str::to_string),
        })
    }

    /// Lists the registered parameters of a resource type, sorted by name.
    pub fn rules_for(&self, resource_type: &str) -> Vec<SearchParamRule> {
        let prefix = format!("{resource_type}.");
        let mut names: Vec<&str> = self
            .entries
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.ends_with(JOIN_SUFFIX) && !rest.ends_with(DEFAULT_SUFFIX))
            .collect();
        names.sort_unstable();

        names
            .into_iter()
            .filter_map(|name| self.rule(resource_type, name))
            .collect()
    }

    /// Number of raw entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
# comment line
Patient.family=string
Patient.family.join=JOIN names n
Patient.family.default=n.family = '~v0~'

not a rule
Patient.gender=token
";

    #[test]
    fn test_parse_and_resolve() {
        let rules = SearchRules::parse(SOURCE).unwrap();
        assert_eq!(rules.len(), 4);

        let rule = rules.rule("Patient", "family").unwrap();
        assert_eq!(rule.where_template, "string");
        assert_eq!(rule.join_clause.as_deref(), Some("JOIN names n"));
        assert_eq!(rule.default_template.as_deref(), Some("n.family = '~v0~'"));

        let rule = rules.rule("Patient", "gender").unwrap();
        assert!(rule.join_clause.is_none());
        assert!(rule.default_template.is_none());

        assert!(rules.rule("Patient", "birthdate").is_none());
    }

    #[test]
    fn test_value_split_at_first_equals() {
        let rules = SearchRules::parse("A.b.default=x = 'y=z'").unwrap();
        assert_eq!(rules.get("A.b.default"), Some("x = 'y=z'"));
    }

    #[test]
    fn test_comment_with_equals_ignored() {
        let rules = SearchRules::parse("#Patient.family=string").unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = SearchRules::parse("A.b=1\nA.b=2").unwrap_err();
        assert!(matches!(err, SearchError::RuleParse { line: 2, .. }));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(SearchRules::parse("=value").is_err());
    }

    #[test]
    fn test_rules_for_lists_base_rules() {
        let rules = SearchRules::parse(SOURCE).unwrap();
        let names: Vec<String> = rules
            .rules_for("Patient")
            .into_iter()
            .map(|r| r.param_name)
            .collect();
        assert_eq!(names, vec!["family", "gender"]);
    }

    #[test]
    fn test_embedded_rules_parse() {
        let rules = SearchRules::embedded().unwrap();
        assert!(rules.rule("Patient", "family").is_some());
        assert!(rules.rule("Observation", "subject").is_some());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.txt");
        std::fs::write(&path, SOURCE).unwrap();

        let rules = SearchRules::load(&path).unwrap();
        assert!(rules.rule("Patient", "family").is_some());

        assert!(SearchRules::load(dir.path().join("missing.txt")).is_err());
    }
}
