//! Positional argument checks for action handlers.
//!
//! The orchestrator sends a loosely typed JSON array. Each handler declares
//! the shape it needs through [`Args`] and gets a typed value or an
//! [`CpiError::InvalidArgument`] back.

use serde_json::{Map, Value};

use crate::error::{CpiError, Result};

/// Borrowed view over a request's `arguments` array.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub const fn new(values: &'a [Value]) -> Self {
        Self { values }
    }

    fn required(&self, position: usize, name: &'static str) -> Result<&'a Value> {
        self.values.get(position).ok_or_else(|| {
            CpiError::invalid_argument(
                position,
                name,
                format!("missing (got {} arguments)", self.values.len()),
            )
        })
    }

    /// Required string argument.
    pub fn string(&self, position: usize, name: &'static str) -> Result<&'a str> {
        let value = self.required(position, name)?;
        value
            .as_str()
            .ok_or_else(|| CpiError::invalid_argument(position, name, mismatch("string", value)))
    }

    /// Required non-negative integer argument.
    pub fn unsigned(&self, position: usize, name: &'static str) -> Result<u64> {
        let value = self.required(position, name)?;
        value.as_u64().ok_or_else(|| {
            CpiError::invalid_argument(position, name, mismatch("non-negative integer", value))
        })
    }

    /// Required object argument.
    pub fn object(&self, position: usize, name: &'static str) -> Result<&'a Map<String, Value>> {
        let value = self.required(position, name)?;
        value
            .as_object()
            .ok_or_else(|| CpiError::invalid_argument(position, name, mismatch("object", value)))
    }

    /// Optional object argument. Absent and `null` both yield `None`.
    pub fn optional_object(
        &self,
        position: usize,
        name: &'static str,
    ) -> Result<Option<&'a Map<String, Value>>> {
        match self.values.get(position) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(CpiError::invalid_argument(
                position,
                name,
                mismatch("object", other),
            )),
        }
    }

    /// Optional array argument. Absent and `null` both yield `None`.
    pub fn optional_array(&self, position: usize, name: &'static str) -> Result<Option<&'a [Value]>> {
        match self.values.get(position) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items.as_slice())),
            Some(other) => Err(CpiError::invalid_argument(
                position,
                name,
                mismatch("array", other),
            )),
        }
    }
}

/// Required string entry inside an object argument.
pub fn property_string<'a>(
    props: &'a Map<String, Value>,
    position: usize,
    name: &'static str,
    key: &str,
) -> Result<&'a str> {
    match props.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(CpiError::invalid_argument(
            position,
            name,
            format!("property '{key}' {}", mismatch("string", other)),
        )),
        None => Err(CpiError::invalid_argument(
            position,
            name,
            format!("property '{key}' is required"),
        )),
    }
}

/// Optional string entry inside an object argument.
pub fn optional_property_string<'a>(
    props: &'a Map<String, Value>,
    position: usize,
    name: &'static str,
    key: &str,
) -> Result<Option<&'a str>> {
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(CpiError::invalid_argument(
            position,
            name,
            format!("property '{key}' {}", mismatch("string", other)),
        )),
    }
}

fn mismatch(expected: &str, got: &Value) -> String {
    format!("expected {expected}, got {}", type_name(got))
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_ok() {
        let values = vec![json!("vm-1")];
        let args = Args::new(&values);
        assert_eq!(args.string(0, "vm_cid").unwrap(), "vm-1");
    }

    #[test]
    fn string_missing() {
        let values: Vec<Value> = vec![];
        let err = Args::new(&values).string(0, "vm_cid").unwrap_err();
        assert!(matches!(
            err,
            CpiError::InvalidArgument {
                position: 0,
                name: "vm_cid",
                ..
            }
        ));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn string_wrong_type() {
        let values = vec![json!(5)];
        let err = Args::new(&values).string(0, "vm_cid").unwrap_err();
        assert!(err.to_string().contains("expected string, got number"));
    }

    #[test]
    fn unsigned_rejects_negative_and_strings() {
        let values = vec![json!(-1), json!("10")];
        let args = Args::new(&values);
        assert!(args.unsigned(0, "size").is_err());
        assert!(args.unsigned(1, "size").is_err());
    }

    #[test]
    fn optional_object_accepts_null_and_absent() {
        let values = vec![Value::Null];
        let args = Args::new(&values);
        assert!(args.optional_object(0, "env").unwrap().is_none());
        assert!(args.optional_object(1, "env").unwrap().is_none());
    }

    #[test]
    fn optional_object_rejects_wrong_type() {
        let values = vec![json!([1, 2])];
        assert!(Args::new(&values).optional_object(0, "env").is_err());
    }

    #[test]
    fn optional_array_checks() {
        let values = vec![json!(["disk-1"]), json!("disk-1")];
        let args = Args::new(&values);
        assert_eq!(args.optional_array(0, "disk_cids").unwrap().unwrap().len(), 1);
        assert!(args.optional_array(1, "disk_cids").is_err());
        assert!(args.optional_array(2, "disk_cids").unwrap().is_none());
    }

    #[test]
    fn property_checks() {
        let props = json!({"flavor": "core-100", "size": 3});
        let map = props.as_object().unwrap();
        assert_eq!(
            property_string(map, 2, "cloud_properties", "flavor").unwrap(),
            "core-100"
        );
        assert!(property_string(map, 2, "cloud_properties", "size").is_err());
        assert!(property_string(map, 2, "cloud_properties", "missing").is_err());
        assert_eq!(
            optional_property_string(map, 2, "cloud_properties", "missing").unwrap(),
            None
        );
        assert!(optional_property_string(map, 2, "cloud_properties", "size").is_err());
    }
}
