//! Object/shape checks run on declarative records before any field is read.

use crate::result::{TestError, TestResult};
use serde_json::{Map, Value};

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fail unless `value` is a plain key/value mapping
///
/// # Errors
///
/// Returns a configuration error for arrays, primitives and null
pub fn assert_is_object(value: &Value) -> TestResult<&Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        TestError::configuration(format!("expected an object but got {}", kind_of(value)))
    })
}

/// Check the mapping's own keys against `allowed`.
///
/// With `strict`, every allowed key must be present (the first missing key
/// fails) and no other key may exist. Otherwise only unknown keys fail.
///
/// # Errors
///
/// Returns a configuration error naming the offending key
pub fn assert_keys_subset(value: &Value, allowed: &[&str], strict: bool) -> TestResult<()> {
    let object = assert_is_object(value)?;

    if strict {
        if let Some(missing) = allowed.iter().find(|k| !object.contains_key(**k)) {
            return Err(TestError::configuration(format!("missing key: {missing}")));
        }
    }

    if let Some(extra) = object.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(TestError::configuration(format!(
            "unexpected key: {extra} (allowed: {})",
            allowed.join(", ")
        )));
    }

    Ok(())
}
