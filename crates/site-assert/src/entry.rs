//! Declarative entry and spec records.
//!
//! Records can be built with typed builders or parsed from JSON/YAML values.
//! Parsing always validates the key set first, so a typo such as
//! `"titleContain"` fails with the key name instead of being ignored.

use crate::assertion::shape::{assert_is_object, assert_keys_subset};
use crate::assertion::text::Fragments;
use crate::result::{TestError, TestResult};
use crate::wildcards::WildcardTable;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Keys accepted in an HTTP request entry
pub const REQUEST_ENTRY_KEYS: &[&str] = &[
    "url",
    "postParameters",
    "responseCode",
    "is",
    "contains",
    "notContains",
    "startWith",
    "endWith",
];

/// Keys accepted in a browser-state spec (and in a page-load entry)
pub const BROWSER_STATE_KEYS: &[&str] = &[
    "url",
    "titleContains",
    "ignoreConsoleErrors",
    "sourceHtmlStartsWith",
    "sourceHtmlEndsWith",
    "sourceHtmlContains",
    "sourceHtmlNotContains",
    "sourceHtmlRegExp",
    "loadedHtmlStartsWith",
    "loadedHtmlEndsWith",
    "loadedHtmlContains",
    "loadedHtmlNotContains",
    "loadedHtmlRegExp",
    "tabsCount",
];

/// Keys of a redirect entry, all required
pub const REDIRECT_ENTRY_KEYS: &[&str] = &["url", "to"];

/// A record that can be parsed from a declarative value and deduplicated
pub trait EntryRecord: Sized {
    /// Parse from a bare URL string or a mapping with recognised keys
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown keys or mistyped fields
    fn from_value(value: &Value) -> TestResult<Self>;

    /// Identity used for duplicate detection
    fn identity(&self) -> String;
}

fn deserialize_record<T: DeserializeOwned>(value: &Value) -> TestResult<T> {
    serde_json::from_value(value.clone()).map_err(|e| TestError::configuration(e.to_string()))
}

fn require_url(value: &Value) -> TestResult<()> {
    let object = assert_is_object(value)?;
    match object.get("url") {
        Some(Value::String(_)) => Ok(()),
        Some(_) => Err(TestError::configuration("url must be a string")),
        None => Err(TestError::configuration("missing key: url")),
    }
}

/// Parse a list of entries from a JSON array value
///
/// # Errors
///
/// Returns a configuration error if the value is not an array or any entry is malformed
pub fn entries_from_value<T: EntryRecord>(value: &Value) -> TestResult<Vec<T>> {
    value
        .as_array()
        .ok_or_else(|| TestError::configuration("entries must be a list"))?
        .iter()
        .map(T::from_value)
        .collect()
}

/// Parse a list of entries from JSON text
///
/// # Errors
///
/// Returns an error if the text is not valid JSON or any entry is malformed
pub fn entries_from_json_str<T: EntryRecord>(json: &str) -> TestResult<Vec<T>> {
    let value: Value = serde_json::from_str(json)?;
    entries_from_value(&value)
}

/// Parse a list of entries from YAML text
///
/// # Errors
///
/// Returns an error if the text is not valid YAML or any entry is malformed
pub fn entries_from_yaml_str<T: EntryRecord>(yaml: &str) -> TestResult<Vec<T>> {
    let value: Value = serde_yaml_ng::from_str(yaml)?;
    entries_from_value(&value)
}

/// Fail on the first entry whose identity was already seen
///
/// # Errors
///
/// Returns a configuration error naming the duplicated identity
pub fn reject_duplicates<T: EntryRecord>(entries: &[T]) -> TestResult<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        let identity = entry.identity();
        if !seen.insert(identity.clone()) {
            return Err(TestError::configuration(format!(
                "duplicate entry: {identity}"
            )));
        }
    }
    Ok(())
}

// =============================================================================
// HTTP REQUEST ENTRY
// =============================================================================

/// One HTTP request plus its expected outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestEntry {
    /// Target URL, wildcards allowed
    pub url: String,
    /// Form parameters; their presence switches GET to POST. Numbers and
    /// booleans are sent as their text form.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_form"
    )]
    pub post_parameters: Option<BTreeMap<String, String>>,
    /// Expected HTTP status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
    /// Exact expected body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is: Option<String>,
    /// Fragments the body must contain, in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<Fragments>,
    /// Fragments the body must not contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_contains: Option<Fragments>,
    /// Expected body prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_with: Option<Fragments>,
    /// Expected body suffix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_with: Option<Fragments>,
}

impl RequestEntry {
    /// Create a GET entry for `url`
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Add a POST parameter
    #[must_use]
    pub fn with_post_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.post_parameters
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Expect a status code
    #[must_use]
    pub const fn with_response_code(mut self, code: u16) -> Self {
        self.response_code = Some(code);
        self
    }

    /// Expect an exact body
    #[must_use]
    pub fn with_is(mut self, body: impl Into<String>) -> Self {
        self.is = Some(body.into());
        self
    }

    /// Expect the body to contain fragments
    #[must_use]
    pub fn with_contains(mut self, fragments: impl Into<Fragments>) -> Self {
        self.contains = Some(fragments.into());
        self
    }

    /// Expect the body to contain none of the fragments
    #[must_use]
    pub fn with_not_contains(mut self, fragments: impl Into<Fragments>) -> Self {
        self.not_contains = Some(fragments.into());
        self
    }

    /// Expect a body prefix
    #[must_use]
    pub fn with_start_with(mut self, fragments: impl Into<Fragments>) -> Self {
        self.start_with = Some(fragments.into());
        self
    }

    /// Expect a body suffix
    #[must_use]
    pub fn with_end_with(mut self, fragments: impl Into<Fragments>) -> Self {
        self.end_with = Some(fragments.into());
        self
    }

    /// Whether this entry is sent as POST
    #[must_use]
    pub const fn is_post(&self) -> bool {
        self.post_parameters.is_some()
    }

    /// Copy with wildcards applied to the URL, parameters and expectations
    #[must_use]
    pub fn with_wildcards(&self, table: &WildcardTable) -> Self {
        let sub = |s: &str| table.substitute(s);
        Self {
            url: table.substitute(&self.url),
            post_parameters: self.post_parameters.as_ref().map(|params| {
                params
                    .iter()
                    .map(|(k, v)| (k.clone(), table.substitute(v)))
                    .collect()
            }),
            response_code: self.response_code,
            is: self.is.as_deref().map(sub),
            contains: self.contains.as_ref().map(|f| f.map(sub)),
            not_contains: self.not_contains.as_ref().map(|f| f.map(sub)),
            start_with: self.start_with.as_ref().map(|f| f.map(sub)),
            end_with: self.end_with.as_ref().map(|f| f.map(sub)),
        }
    }
}

fn deserialize_form<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some(raw) = Option::<BTreeMap<String, Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    raw.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            Value::Number(n) => Ok((key, n.to_string())),
            Value::Bool(b) => Ok((key, b.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "postParameters.{key} must be a string, number or boolean, got {other}"
            ))),
        })
        .collect::<Result<_, _>>()
        .map(Some)
}

impl EntryRecord for RequestEntry {
    fn from_value(value: &Value) -> TestResult<Self> {
        if let Some(url) = value.as_str() {
            return Ok(Self::new(url));
        }
        assert_keys_subset(value, REQUEST_ENTRY_KEYS, false)?;
        require_url(value)?;
        deserialize_record(value)
    }

    fn identity(&self) -> String {
        match &self.post_parameters {
            Some(params) => {
                let serialized = serde_json::to_string(params).unwrap_or_default();
                format!("{} {serialized}", self.url)
            }
            None => self.url.clone(),
        }
    }
}

impl From<&str> for RequestEntry {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

// =============================================================================
// BROWSER STATE SPEC
// =============================================================================

/// How console errors are excused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IgnoreConsoleErrors {
    /// `true` ignores every console error, `false` ignores none
    All(bool),
    /// Errors containing any of these substrings are ignored
    Containing(Vec<String>),
}

/// Expectations about the current browser session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BrowserStateSpec {
    /// Substring expected in the current URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Substring expected in the document title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_contains: Option<String>,
    /// Console error excuses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_console_errors: Option<IgnoreConsoleErrors>,
    /// Prefix of the original document source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_html_starts_with: Option<String>,
    /// Suffix of the original document source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_html_ends_with: Option<String>,
    /// Fragments of the original document source, in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_html_contains: Option<Fragments>,
    /// Fragments absent from the original document source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_html_not_contains: Option<Fragments>,
    /// Pattern the original document source must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_html_reg_exp: Option<String>,
    /// Prefix of the live DOM serialization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_html_starts_with: Option<String>,
    /// Suffix of the live DOM serialization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_html_ends_with: Option<String>,
    /// Fragments of the live DOM serialization, in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_html_contains: Option<Fragments>,
    /// Fragments absent from the live DOM serialization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_html_not_contains: Option<Fragments>,
    /// Pattern the live DOM serialization must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_html_reg_exp: Option<String>,
    /// Expected number of open tabs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tabs_count: Option<usize>,
}

impl BrowserStateSpec {
    /// Create an empty spec (only console errors are checked)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a mapping, validating the key set before anything else
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first unrecognised key
    pub fn from_value(value: &Value) -> TestResult<Self> {
        assert_keys_subset(value, BROWSER_STATE_KEYS, false)?;
        let spec: Self = deserialize_record(value)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check that regular expressions compile
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid pattern
    pub fn validate(&self) -> TestResult<()> {
        for (key, pattern) in [
            ("sourceHtmlRegExp", &self.source_html_reg_exp),
            ("loadedHtmlRegExp", &self.loaded_html_reg_exp),
        ] {
            if let Some(p) = pattern {
                Regex::new(p)
                    .map_err(|e| TestError::configuration(format!("invalid {key}: {e}")))?;
            }
        }
        Ok(())
    }

    /// Whether any check needs the original (pre-script) document source
    #[must_use]
    pub const fn needs_source_html(&self) -> bool {
        self.source_html_starts_with.is_some()
            || self.source_html_ends_with.is_some()
            || self.source_html_contains.is_some()
            || self.source_html_not_contains.is_some()
            || self.source_html_reg_exp.is_some()
    }

    /// Expect a URL substring
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Expect a title substring
    #[must_use]
    pub fn with_title_contains(mut self, title: impl Into<String>) -> Self {
        self.title_contains = Some(title.into());
        self
    }

    /// Ignore every console error
    #[must_use]
    pub fn ignoring_all_console_errors(mut self) -> Self {
        self.ignore_console_errors = Some(IgnoreConsoleErrors::All(true));
        self
    }

    /// Ignore console errors containing any of these substrings
    #[must_use]
    pub fn ignoring_console_errors<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_console_errors = Some(IgnoreConsoleErrors::Containing(
            substrings.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Expect fragments in the original source
    #[must_use]
    pub fn with_source_html_contains(mut self, fragments: impl Into<Fragments>) -> Self {
        self.source_html_contains = Some(fragments.into());
        self
    }

    /// Expect fragments absent from the original source
    #[must_use]
    pub fn with_source_html_not_contains(mut self, fragments: impl Into<Fragments>) -> Self {
        self.source_html_not_contains = Some(fragments.into());
        self
    }

    /// Expect a prefix of the original source
    #[must_use]
    pub fn with_source_html_starts_with(mut self, prefix: impl Into<String>) -> Self {
        self.source_html_starts_with = Some(prefix.into());
        self
    }

    /// Expect a suffix of the original source
    #[must_use]
    pub fn with_source_html_ends_with(mut self, suffix: impl Into<String>) -> Self {
        self.source_html_ends_with = Some(suffix.into());
        self
    }

    /// Expect the original source to match a pattern
    #[must_use]
    pub fn with_source_html_reg_exp(mut self, pattern: impl Into<String>) -> Self {
        self.source_html_reg_exp = Some(pattern.into());
        self
    }

    /// Expect fragments in the live DOM
    #[must_use]
    pub fn with_loaded_html_contains(mut self, fragments: impl Into<Fragments>) -> Self {
        self.loaded_html_contains = Some(fragments.into());
        self
    }

    /// Expect fragments absent from the live DOM
    #[must_use]
    pub fn with_loaded_html_not_contains(mut self, fragments: impl Into<Fragments>) -> Self {
        self.loaded_html_not_contains = Some(fragments.into());
        self
    }

    /// Expect a prefix of the live DOM
    #[must_use]
    pub fn with_loaded_html_starts_with(mut self, prefix: impl Into<String>) -> Self {
        self.loaded_html_starts_with = Some(prefix.into());
        self
    }

    /// Expect a suffix of the live DOM
    #[must_use]
    pub fn with_loaded_html_ends_with(mut self, suffix: impl Into<String>) -> Self {
        self.loaded_html_ends_with = Some(suffix.into());
        self
    }

    /// Expect the live DOM to match a pattern
    #[must_use]
    pub fn with_loaded_html_reg_exp(mut self, pattern: impl Into<String>) -> Self {
        self.loaded_html_reg_exp = Some(pattern.into());
        self
    }

    /// Expect a number of open tabs
    #[must_use]
    pub const fn with_tabs_count(mut self, count: usize) -> Self {
        self.tabs_count = Some(count);
        self
    }

    /// Copy with wildcards applied to every expected string
    #[must_use]
    pub fn with_wildcards(&self, table: &WildcardTable) -> Self {
        let sub = |s: &String| table.substitute(s);
        let subf = |f: &Fragments| f.map(|s| table.substitute(s));
        Self {
            url: self.url.as_ref().map(sub),
            title_contains: self.title_contains.as_ref().map(sub),
            ignore_console_errors: self.ignore_console_errors.as_ref().map(|policy| match policy {
                IgnoreConsoleErrors::All(all) => IgnoreConsoleErrors::All(*all),
                IgnoreConsoleErrors::Containing(list) => {
                    IgnoreConsoleErrors::Containing(table.substitute_all(list))
                }
            }),
            source_html_starts_with: self.source_html_starts_with.as_ref().map(sub),
            source_html_ends_with: self.source_html_ends_with.as_ref().map(sub),
            source_html_contains: self.source_html_contains.as_ref().map(subf),
            source_html_not_contains: self.source_html_not_contains.as_ref().map(subf),
            source_html_reg_exp: self.source_html_reg_exp.clone(),
            loaded_html_starts_with: self.loaded_html_starts_with.as_ref().map(sub),
            loaded_html_ends_with: self.loaded_html_ends_with.as_ref().map(sub),
            loaded_html_contains: self.loaded_html_contains.as_ref().map(subf),
            loaded_html_not_contains: self.loaded_html_not_contains.as_ref().map(subf),
            loaded_html_reg_exp: self.loaded_html_reg_exp.clone(),
            tabs_count: self.tabs_count,
        }
    }
}

// =============================================================================
// PAGE LOAD ENTRY
// =============================================================================

/// A page to load plus the browser-state expectations checked after loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadEntry {
    /// URL to navigate to, wildcards allowed
    pub url: String,
    /// Expectations; `spec.url` defaults to the entry URL
    pub spec: BrowserStateSpec,
}

impl LoadEntry {
    /// Create an entry for `url` with no further expectations
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            spec: BrowserStateSpec::new().with_url(url.clone()),
            url,
        }
    }

    /// Replace the spec; the URL expectation falls back to the entry URL
    #[must_use]
    pub fn with_spec(mut self, spec: BrowserStateSpec) -> Self {
        let url = spec.url.clone().unwrap_or_else(|| self.url.clone());
        self.spec = spec.with_url(url);
        self
    }
}

impl EntryRecord for LoadEntry {
    fn from_value(value: &Value) -> TestResult<Self> {
        if let Some(url) = value.as_str() {
            return Ok(Self::new(url));
        }
        assert_keys_subset(value, BROWSER_STATE_KEYS, false)?;
        require_url(value)?;
        let spec = BrowserStateSpec::from_value(value)?;
        let url = spec.url.clone().unwrap_or_default();
        Ok(Self { url, spec })
    }

    fn identity(&self) -> String {
        self.url.clone()
    }
}

impl From<&str> for LoadEntry {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

// =============================================================================
// REDIRECT ENTRY
// =============================================================================

/// A URL expected to end up at `to` after navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedirectEntry {
    /// Source URL
    pub url: String,
    /// Expected final URL (suffix or substring)
    pub to: String,
}

impl RedirectEntry {
    /// Create a redirect expectation
    #[must_use]
    pub fn new(url: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            to: to.into(),
        }
    }
}

impl EntryRecord for RedirectEntry {
    fn from_value(value: &Value) -> TestResult<Self> {
        assert_keys_subset(value, REDIRECT_ENTRY_KEYS, true)?;
        deserialize_record(value)
    }

    fn identity(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod request_entry_tests {
        use super::*;

        #[test]
        fn test_bare_string_entry() {
            let entry = RequestEntry::from_value(&json!("http://a/b")).unwrap();
            assert_eq!(entry, RequestEntry::new("http://a/b"));
            assert!(!entry.is_post());
        }

        #[test]
        fn test_full_entry_parses() {
            let entry = RequestEntry::from_value(&json!({
                "url": "http://a/api",
                "postParameters": {"q": "1"},
                "responseCode": 201,
                "contains": ["a", "b"],
                "startWith": "{",
                "endWith": "}"
            }))
            .unwrap();
            assert!(entry.is_post());
            assert_eq!(entry.response_code, Some(201));
            assert_eq!(entry.contains.unwrap().as_slice(), ["a", "b"]);
        }

        #[test]
        fn test_unknown_key_rejected() {
            let err = RequestEntry::from_value(&json!({"url": "x", "respCode": 200})).unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains("respCode"));
        }

        #[test]
        fn test_missing_url_rejected() {
            let err = RequestEntry::from_value(&json!({"is": "x"})).unwrap_err();
            assert!(err.to_string().contains("missing key: url"));
        }

        #[test]
        fn test_mistyped_field_is_configuration_error() {
            let err = RequestEntry::from_value(&json!({"url": "x", "responseCode": "ok"})).unwrap_err();
            assert!(err.is_configuration());
        }

        #[test]
        fn test_scalar_post_parameters_sent_as_text() {
            let entry = RequestEntry::from_value(&json!({
                "url": "http://site/api",
                "postParameters": {"id": 5, "ratio": 0.5, "active": true, "name": "ada"}
            }))
            .unwrap();
            let params = entry.post_parameters.unwrap();
            assert_eq!(params["id"], "5");
            assert_eq!(params["ratio"], "0.5");
            assert_eq!(params["active"], "true");
            assert_eq!(params["name"], "ada");
        }

        #[test]
        fn test_nested_post_parameter_rejected() {
            let err = RequestEntry::from_value(&json!({"url": "u", "postParameters": {"tags": ["a"]}})).unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains("postParameters.tags"));
        }

        #[test]
        fn test_identity_includes_post_parameters() {
            let get = RequestEntry::new("u");
            let post = RequestEntry::new("u").with_post_parameter("a", "1");
            assert_ne!(get.identity(), post.identity());
            assert!(reject_duplicates(&[get.clone(), post.clone()]).is_ok());
            let err = reject_duplicates(&[post.clone(), get, post]).unwrap_err();
            assert!(err.to_string().contains("duplicate entry"));
        }

        #[test]
        fn test_wildcards_applied() {
            let table = WildcardTable::new().with("$host", "example.org");
            let entry = RequestEntry::new("http://$host/")
                .with_post_parameter("site", "$host")
                .with_contains("$host")
                .with_wildcards(&table);
            assert_eq!(entry.url, "http://example.org/");
            assert_eq!(entry.post_parameters.unwrap()["site"], "example.org");
            assert_eq!(entry.contains.unwrap().as_slice(), ["example.org"]);
        }
    }

    mod browser_spec_tests {
        use super::*;

        #[test]
        fn test_bogus_field_named() {
            let err = BrowserStateSpec::from_value(&json!({"bogusField": 1, "titleContains": "x"}))
                .unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains("bogusField"));
        }

        #[test]
        fn test_spec_rejects_non_object() {
            assert!(BrowserStateSpec::from_value(&json!(["url"])).is_err());
        }

        #[test]
        fn test_ignore_console_errors_shapes() {
            let all = BrowserStateSpec::from_value(&json!({"ignoreConsoleErrors": true})).unwrap();
            assert_eq!(all.ignore_console_errors, Some(IgnoreConsoleErrors::All(true)));
            let list = BrowserStateSpec::from_value(
                &json!({"ignoreConsoleErrors": ["myFunction is not defined"]}),
            )
            .unwrap();
            assert_eq!(
                list.ignore_console_errors,
                Some(IgnoreConsoleErrors::Containing(vec![
                    "myFunction is not defined".to_string()
                ]))
            );
        }

        #[test]
        fn test_camel_case_keys() {
            let spec = BrowserStateSpec::from_value(&json!({
                "sourceHtmlRegExp": "^<!DOCTYPE",
                "loadedHtmlContains": ["<body", "</body>"],
                "tabsCount": 2
            }))
            .unwrap();
            assert!(spec.needs_source_html());
            assert_eq!(spec.tabs_count, Some(2));
        }

        #[test]
        fn test_invalid_regex_rejected() {
            let err = BrowserStateSpec::from_value(&json!({"loadedHtmlRegExp": "("})).unwrap_err();
            assert!(err.to_string().contains("loadedHtmlRegExp"));
        }

        #[test]
        fn test_needs_source_html_only_when_present() {
            assert!(!BrowserStateSpec::new().with_loaded_html_contains("x").needs_source_html());
            assert!(BrowserStateSpec::new().with_source_html_ends_with("x").needs_source_html());
        }
    }

    mod load_and_redirect_tests {
        use super::*;

        #[test]
        fn test_load_entry_url_defaults_spec_url() {
            let entry = LoadEntry::from_value(&json!({"url": "a.html", "titleContains": "A"})).unwrap();
            assert_eq!(entry.url, "a.html");
            assert_eq!(entry.spec.url.as_deref(), Some("a.html"));
            let bare = LoadEntry::from("b.html");
            assert_eq!(bare.spec.url.as_deref(), Some("b.html"));
        }

        #[test]
        fn test_load_entry_duplicates() {
            let entries: Vec<LoadEntry> =
                entries_from_json_str(r#"["a.html", {"url": "a.html"}]"#).unwrap();
            assert!(reject_duplicates(&entries).is_err());
        }

        #[test]
        fn test_redirect_requires_both_keys() {
            assert!(RedirectEntry::from_value(&json!({"url": "a"})).is_err());
            let entry = RedirectEntry::from_value(&json!({"url": "a", "to": "b"})).unwrap();
            assert_eq!(entry, RedirectEntry::new("a", "b"));
        }

        #[test]
        fn test_entries_from_yaml() {
            let yaml = "- url: a.html\n  to: b.html\n- url: c.html\n  to: d.html\n";
            let entries: Vec<RedirectEntry> = entries_from_yaml_str(yaml).unwrap();
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[1].to, "d.html");
        }

        #[test]
        fn test_entries_must_be_list() {
            let err = entries_from_json_str::<RequestEntry>(r#"{"url": "a"}"#).unwrap_err();
            assert!(err.is_configuration());
        }
    }
}
