//! Transformation pipeline.
//!
//! Rules are tenant-authored configuration, not trusted code. Every failure of a rule
//! degrades to a [Sentinel] for the one field it belongs to, and nothing here panics
//! or returns an error to the caller.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use lazy_regex::regex::{Regex, RegexBuilder};
use log::{debug, trace, warn};
use serde_json::Value;

use crate::date;
use crate::field::{FieldDefinition, FieldType, Transformation};

/// Visible marker of a degraded transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    InvalidRegex,
    NoMatch,
    InvalidDate,
}

impl Sentinel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentinel::InvalidRegex => "Invalid Regex",
            Sentinel::NoMatch => "No match",
            Sentinel::InvalidDate => "Invalid Date",
        }
    }
}

impl std::fmt::Display for Sentinel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [transform].
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    /// Transformed value. `None` is "not set", as in resolution.
    Value(Option<Value>),

    /// The rule could not be applied.
    Sentinel(Sentinel),
}

impl Transformed {
    /// Flatten into a plain value, sentinels becoming their display strings.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Transformed::Value(value) => value,
            Transformed::Sentinel(sentinel) => Some(Value::String(sentinel.as_str().to_owned())),
        }
    }

    pub fn sentinel(&self) -> Option<Sentinel> {
        match self {
            Transformed::Sentinel(sentinel) => Some(*sentinel),
            Transformed::Value(_) => None,
        }
    }
}

/// Compiled patterns keyed by rule text. Failed compilations are remembered too, so a
/// bad rule is only compiled once.
#[derive(Debug)]
pub struct PatternCache {
    size_limit: usize,
    patterns: RwLock<HashMap<String, Option<Regex>>>,
}

impl PatternCache {
    pub fn new(size_limit: usize) -> Self {
        Self {
            size_limit,
            patterns: RwLock::new(HashMap::new()),
        }
    }

    /// Compiled pattern for `rule`, or `None` if it does not compile.
    pub fn get(&self, rule: &str) -> Option<Regex> {
        {
            let patterns = self.patterns.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(compiled) = patterns.get(rule) {
                trace!("Pattern cache hit for `{rule}`");
                return compiled.clone();
            }
        }

        let compiled = compile(rule, self.size_limit);
        debug!("Pattern cache miss for `{rule}`, compiled: {}", compiled.is_some());
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(rule.to_owned(), compiled.clone());
        compiled
    }

    pub fn len(&self) -> usize {
        self.patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(1 << 20)
    }
}

fn compile(rule: &str, size_limit: usize) -> Option<Regex> {
    match RegexBuilder::new(rule).size_limit(size_limit).build() {
        Ok(regex) => Some(regex),
        Err(err) => {
            warn!("Transformation rule `{rule}` does not compile: {err}");
            None
        }
    }
}

/// Apply the field's transformation to a resolved raw value.
pub fn transform(raw: Option<Value>, field: &FieldDefinition, cache: &PatternCache) -> Transformed {
    match field.transformation {
        None => Transformed::Value(raw),
        Some(Transformation::Extract) => extract(raw, field, cache),
    }
}

fn extract(raw: Option<Value>, field: &FieldDefinition, cache: &PatternCache) -> Transformed {
    let Some(Value::String(text)) = raw else {
        trace!("Extraction on `{}` skipped, raw value is not a string", field.id);
        return Transformed::Value(Some(Value::Null));
    };

    let Some(regex) = field.rule().and_then(|rule| cache.get(rule)) else {
        return Transformed::Sentinel(Sentinel::InvalidRegex);
    };

    let Some(found) = regex.find(&text) else {
        trace!("Extraction on `{}` found no match", field.id);
        return Transformed::Sentinel(Sentinel::NoMatch);
    };

    if field.ty != FieldType::Date {
        return Transformed::Value(Some(Value::String(found.as_str().to_owned())));
    }

    match date::parse_extracted(found.as_str()) {
        Some(dt) => Transformed::Value(Some(Value::String(date::to_iso_instant(&dt)))),
        None => {
            debug!("Extracted `{}` on `{}` is not a date", found.as_str(), field.id);
            Transformed::Sentinel(Sentinel::InvalidDate)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn field(ty: FieldType, rule: &str) -> FieldDefinition {
        FieldDefinition::new("f".parse().unwrap(), ty).with_extract(rule)
    }

    fn text(s: &str) -> Option<Value> {
        Some(Value::String(s.to_owned()))
    }

    #[test]
    fn identity_without_transformation() {
        crate::init_log();
        let cache = PatternCache::default();
        let plain = FieldDefinition::new("f".parse().unwrap(), FieldType::Tags);
        for raw in [None, Some(json!(null)), Some(json!(["a", "b"])), text("x")] {
            assert_eq!(
                transform(raw.clone(), &plain, &cache),
                Transformed::Value(raw)
            );
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn extracts_first_match() {
        let cache = PatternCache::default();
        let field = field(FieldType::Text, r"#\d+");
        assert_eq!(
            transform(text("Order #1001, see also #1002"), &field, &cache),
            Transformed::Value(text("#1001"))
        );
    }

    #[test]
    fn extraction_is_deterministic() {
        let cache = PatternCache::default();
        let field = field(FieldType::Text, r"[A-Z]{3}-\d+");
        let first = transform(text("ref PEO-17 and ROS-2"), &field, &cache);
        for _ in 0..3 {
            assert_eq!(transform(text("ref PEO-17 and ROS-2"), &field, &cache), first);
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn extracts_day_first_dates() {
        let cache = PatternCache::default();
        let field = field(FieldType::Date, r"\d{2}/\d{2}/\d{4}");
        assert_eq!(
            transform(text("Order placed on 21/06/2025 for delivery"), &field, &cache),
            Transformed::Value(text("2025-06-21T00:00:00.000Z"))
        );
    }

    #[test]
    fn invalid_regex_is_a_sentinel() {
        let cache = PatternCache::default();
        let field = field(FieldType::Text, "([A-Z)");
        let out = transform(text("ABC"), &field, &cache);
        assert_eq!(out, Transformed::Sentinel(Sentinel::InvalidRegex));
        assert_eq!(out.into_value(), text("Invalid Regex"));

        // Remembered, not recompiled.
        assert_eq!(cache.len(), 1);
        assert_eq!(
            transform(text("ABC"), &field, &cache),
            Transformed::Sentinel(Sentinel::InvalidRegex)
        );
    }

    #[test]
    fn missing_rule_is_invalid_regex() {
        let cache = PatternCache::default();
        let mut field = field(FieldType::Text, "");
        assert_eq!(
            transform(text("x"), &field, &cache),
            Transformed::Sentinel(Sentinel::InvalidRegex)
        );
        field.transformation_rule = None;
        assert_eq!(
            transform(text("x"), &field, &cache),
            Transformed::Sentinel(Sentinel::InvalidRegex)
        );
    }

    #[test]
    fn oversized_rule_is_invalid_regex() {
        let cache = PatternCache::new(64);
        let field = field(FieldType::Text, r"\w{500}");
        assert_eq!(
            transform(text("x"), &field, &cache),
            Transformed::Sentinel(Sentinel::InvalidRegex)
        );
    }

    #[test]
    fn no_match_is_a_sentinel() {
        let cache = PatternCache::default();
        let field = field(FieldType::Date, r"\d{2}/\d{2}/\d{4}");
        assert_eq!(
            transform(text("no date here"), &field, &cache),
            Transformed::Sentinel(Sentinel::NoMatch)
        );
    }

    #[test]
    fn unparseable_date_is_a_sentinel() {
        let cache = PatternCache::default();
        let field = field(FieldType::Date, r"\d{2}/\d{2}/\d{4}");
        assert_eq!(
            transform(text("due 45/13/2025"), &field, &cache),
            Transformed::Sentinel(Sentinel::InvalidDate)
        );
    }

    #[test]
    fn non_string_is_null() {
        let cache = PatternCache::default();
        let field = field(FieldType::Text, r"\d+");
        for raw in [None, Some(json!(42)), Some(json!(["1"])), Some(json!(null))] {
            assert_eq!(
                transform(raw, &field, &cache),
                Transformed::Value(Some(Value::Null))
            );
        }
    }
}
