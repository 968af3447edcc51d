//! Regex handling for `pattern` and `patternProperties`.
//!
//! Schema regexes are written for a backtracking engine. They are compiled
//! with the linear-time `regex` crate under a size limit, so a hostile
//! pattern either fails to compile (and is treated as "no match") or runs in
//! time proportional to the input.
use dashmap::DashMap;
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};

use crate::schema::Schema;

const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Per-node memo entries before the cache is reset.
const MEMO_CAPACITY: usize = 1024;

/// Anchor a schema pattern for whole-string matching: unanchored starts get
/// `.*`, unanchored ends get `.*`, and `\\` is unescaped once.
pub fn adapt_schema_pattern(pattern: &str) -> String {
    let mut adapted = if pattern.starts_with('^') || pattern.starts_with('*') || pattern.starts_with('.') {
        pattern.to_string()
    } else {
        format!(".*{pattern}")
    };
    if !(adapted.ends_with('+') || adapted.ends_with('*') || adapted.ends_with('$')) {
        adapted.push_str(".*");
    }
    adapted.replace("\\\\", "\\")
}

/// Compile an adapted pattern. The error text is kept for diagnostics.
pub fn compile_pattern(pattern: &str) -> Result<Regex, String> {
    let adapted = adapt_schema_pattern(pattern);
    RegexBuilder::new(&format!("^(?:{adapted})$"))
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|err| err.to_string())
}

fn remember<V>(cache: &DashMap<String, V>, name: &str, value: V) {
    if cache.len() >= MEMO_CAPACITY {
        cache.clear();
    }
    cache.insert(name.to_string(), value);
}

// ————————————————————————————————————————————————————————————————————————————
// VALUE PATTERN
// ————————————————————————————————————————————————————————————————————————————

/// The `pattern` keyword of a string schema.
#[derive(Clone, Debug)]
pub struct StringPattern {
    source: String,
    compiled: Option<Regex>,
    error: Option<String>,
    memo: DashMap<String, bool>,
}

impl StringPattern {
    pub fn new(source: &str) -> Self {
        let (compiled, error) = match compile_pattern(source) {
            Ok(regex) => (Some(regex), None),
            Err(err) => {
                tracing::info!(pattern = source, error = %err, "invalid schema pattern");
                (None, Some(err))
            }
        };
        Self { source: source.to_string(), compiled, error, memo: DashMap::new() }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compilation error, if the pattern could not be used.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True when `value` matches. An uncompilable pattern accepts everything;
    /// callers report [`StringPattern::error`] separately.
    pub fn check(&self, value: &str) -> bool {
        let Some(regex) = &self.compiled else {
            return true;
        };
        if let Some(hit) = self.memo.get(value) {
            return *hit;
        }
        let matches = regex.is_match(value);
        remember(&self.memo, value, matches);
        matches
    }
}

impl PartialEq for StringPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PATTERN PROPERTIES
// ————————————————————————————————————————————————————————————————————————————

/// `patternProperties`: regex source to schema, with compiled regexes and a
/// bounded memo of property name to matching source.
#[derive(Clone, Debug)]
pub struct PatternProperties {
    schemas: IndexMap<String, Schema>,
    compiled: Vec<(String, Regex)>,
    memo: DashMap<String, String>,
}

impl PatternProperties {
    pub fn new(schemas: IndexMap<String, Schema>) -> Self {
        let compiled = schemas
            .keys()
            .filter_map(|source| match compile_pattern(source) {
                Ok(regex) => Some((source.clone(), regex)),
                Err(err) => {
                    tracing::info!(pattern = %source, error = %err, "invalid pattern property");
                    None
                }
            })
            .collect();
        Self { schemas, compiled, memo: DashMap::new() }
    }

    pub fn schemas(&self) -> &IndexMap<String, Schema> {
        &self.schemas
    }

    pub fn into_schemas(self) -> IndexMap<String, Schema> {
        self.schemas
    }

    /// First schema whose pattern matches `name`.
    pub fn schema_for(&self, name: &str) -> Option<&Schema> {
        if let Some(source) = self.memo.get(name) {
            return self.schemas.get(source.as_str());
        }
        let (source, _) = self.compiled.iter().find(|(_, regex)| regex.is_match(name))?;
        remember(&self.memo, name, source.clone());
        self.schemas.get(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FileId, SchemaObject};
    use std::sync::Arc;

    #[test]
    fn adapts_unanchored_patterns() {
        assert_eq!(adapt_schema_pattern("^x-"), "^x-.*");
        assert_eq!(adapt_schema_pattern("foo"), ".*foo.*");
        assert_eq!(adapt_schema_pattern("^a+"), "^a+");
        assert_eq!(adapt_schema_pattern("^a$"), "^a$");
        assert_eq!(adapt_schema_pattern(r"^\\d$"), r"^\d$");
    }

    #[test]
    fn string_pattern_matches_and_reports_errors() {
        let digits = StringPattern::new("^[0-9]+$");
        assert!(digits.check("123"));
        assert!(!digits.check("12a"));
        assert!(!digits.check("12a"));
        assert!(digits.error().is_none());

        let broken = StringPattern::new("([");
        assert!(broken.error().is_some());
        assert!(broken.check("anything"));
    }

    #[test]
    fn pattern_properties_reuse_cached_match() {
        let target: Schema = Arc::new(SchemaObject::new(FileId::new("mem://a"), "/patternProperties/^x-"));
        let mut schemas = IndexMap::new();
        schemas.insert("^x-".to_string(), target.clone());
        schemas.insert("(".to_string(), target.clone());
        let props = PatternProperties::new(schemas);

        let first = props.schema_for("x-foo").unwrap();
        assert!(Arc::ptr_eq(first, &target));
        let second = props.schema_for("x-foo").unwrap();
        assert!(Arc::ptr_eq(first, second));
        assert!(props.schema_for("y-foo").is_none());
    }
}
