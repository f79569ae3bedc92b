//! Wildcard substitution for environment-specific URLs and expected texts.
//!
//! A [`WildcardTable`] maps placeholder tokens (for example `$host`) to
//! replacement strings. Replacements are applied one key at a time in
//! insertion order; keys that are substrings of other keys are not detected,
//! so `$host` and `$hostname` in the same table depend on that order.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Ordered placeholder → replacement table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WildcardTable {
    entries: Vec<(String, String)>,
}

impl WildcardTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a wildcard (builder style)
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace a wildcard; a replaced key keeps its original position
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove a wildcard, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Look up a replacement
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Number of wildcards
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace every literal occurrence of each key in `text`
    #[must_use]
    pub fn substitute(&self, text: &str) -> String {
        self.entries
            .iter()
            .filter(|(k, _)| !k.is_empty())
            .fold(text.to_string(), |acc, (k, v)| acc.replace(k.as_str(), v))
    }

    /// Substitute inside every string of a JSON structure, returning a new value
    #[must_use]
    pub fn substitute_deep(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.substitute(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.substitute_deep(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.substitute_deep(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Substitute inside every string of a list
    #[must_use]
    pub fn substitute_all(&self, items: &[String]) -> Vec<String> {
        items.iter().map(|s| self.substitute(s)).collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for WildcardTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (k, v) in iter {
            table.set(k, v);
        }
        table
    }
}

impl Serialize for WildcardTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct WildcardVisitor;

impl<'de> Visitor<'de> for WildcardVisitor {
    type Value = WildcardTable;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of wildcard tokens to replacement strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut table = WildcardTable::new();
        while let Some((k, v)) = access.next_entry::<String, String>()? {
            table.set(k, v);
        }
        Ok(table)
    }
}

impl<'de> Deserialize<'de> for WildcardTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(WildcardVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn table() -> WildcardTable {
        WildcardTable::new()
            .with("$host", "localhost:8080")
            .with("$lang", "en")
    }

    #[test]
    fn test_substitute_replaces_all_occurrences() {
        let out = table().substitute("http://$host/$lang/index.html?back=$host");
        assert_eq!(out, "http://localhost:8080/en/index.html?back=localhost:8080");
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut t = table();
        t.set("$host", "example.com");
        assert_eq!(t.len(), 2);
        assert_eq!(t.iter().next(), Some(("$host", "example.com")));
        assert_eq!(t.get("$lang"), Some("en"));
    }

    #[test]
    fn test_remove() {
        let mut t = table();
        assert_eq!(t.remove("$lang").as_deref(), Some("en"));
        assert!(t.remove("$lang").is_none());
        assert_eq!(t.substitute("$lang"), "$lang");
    }

    #[test]
    fn test_insertion_order_applies_to_overlapping_keys() {
        let short_first = WildcardTable::new().with("$a", "X").with("$ab", "Y");
        let long_first = WildcardTable::new().with("$ab", "Y").with("$a", "X");
        assert_eq!(short_first.substitute("$ab"), "Xb");
        assert_eq!(long_first.substitute("$ab"), "Y");
    }

    #[test]
    fn test_substitute_deep_does_not_mutate_input() {
        let input = json!({"url": "$host/a", "contains": ["$lang", 3], "n": null});
        let out = table().substitute_deep(&input);
        assert_eq!(out, json!({"url": "localhost:8080/a", "contains": ["en", 3], "n": null}));
        assert_eq!(input["url"], "$host/a");
    }

    #[test]
    fn test_deserialize_keeps_document_order() {
        let t: WildcardTable = serde_yaml_ng::from_str("$z: one\n$a: two\n").unwrap();
        let keys: Vec<_> = t.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["$z", "$a"]);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"$z":"one","$a":"two"}"#);
    }

    proptest! {
        #[test]
        fn prop_no_placeholder_is_identity(text in "[a-z /.:]{0,40}") {
            prop_assert_eq!(table().substitute(&text), text);
        }

        #[test]
        fn prop_substitute_is_idempotent(text in "[a-z$/ ]{0,40}") {
            let t = table();
            let once = t.substitute(&text);
            prop_assert_eq!(t.substitute(&once), once);
        }
    }
}
