//! Response Shape Validation
//!
//! Every body received from the appliance passes through [`validate`] or
//! [`validate_list`] before it becomes a typed record. Each record type
//! declares its fields with [`Schema::FIELDS`]; presence and JSON type are
//! checked first so the error names the offending field, then serde builds
//! the typed value.
//!
//! Fields not listed in the schema are ignored, so additive API changes on
//! the appliance side do not break the client.

use crate::error::{Result, SyncError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Expected JSON type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Number,
    String,
    Bool,
    Array,
    /// An array whose elements are all strings
    StringArray,
    Object,
    /// A string restricted to the listed values
    OneOf(&'static [&'static str]),
    Any,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::String => value.is_string(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Array => value.is_array(),
            FieldKind::StringArray => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
            FieldKind::Object => value.is_object(),
            FieldKind::OneOf(allowed) => value
                .as_str()
                .map(|s| allowed.contains(&s))
                .unwrap_or(false),
            FieldKind::Any => true,
        }
    }

    fn describe(&self) -> String {
        match self {
            FieldKind::Integer => "integer".to_string(),
            FieldKind::Number => "number".to_string(),
            FieldKind::String => "string".to_string(),
            FieldKind::Bool => "boolean".to_string(),
            FieldKind::Array => "array".to_string(),
            FieldKind::StringArray => "array of strings".to_string(),
            FieldKind::Object => "object".to_string(),
            FieldKind::OneOf(allowed) => format!("one of {}", allowed.join("|")),
            FieldKind::Any => "any value".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    /// Must be present and non-null
    Required,
    /// Must be present, may be null
    Nullable,
    /// May be absent or null
    Optional,
}

/// One declared field of a record schema
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    presence: Presence,
}

impl Field {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Required,
        }
    }

    pub const fn nullable(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Nullable,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Optional,
        }
    }

    fn check(&self, object: &Map<String, Value>, context: &str) -> Result<()> {
        match (object.get(self.name), self.presence) {
            (None, Presence::Optional) => Ok(()),
            (None, _) => Err(schema_error(
                context,
                self.name,
                format!("is missing (expected {})", self.kind.describe()),
            )),
            (Some(Value::Null), Presence::Required) => Err(schema_error(
                context,
                self.name,
                format!("is null (expected {})", self.kind.describe()),
            )),
            (Some(Value::Null), _) => Ok(()),
            (Some(value), _) if self.kind.matches(value) => Ok(()),
            (Some(value), _) => Err(schema_error(
                context,
                self.name,
                format!(
                    "has wrong type: expected {}, found {}",
                    self.kind.describe(),
                    describe_value(value)
                ),
            )),
        }
    }
}

/// A record type received from the appliance
pub trait Schema: DeserializeOwned {
    /// Human-readable name used in error messages, e.g. "certificate"
    const KIND: &'static str;
    const FIELDS: &'static [Field];
}

/// Validate a single record
pub fn validate<T: Schema>(raw: Value) -> Result<T> {
    validate_at(raw, T::KIND)
}

/// Validate a list of records; the error names the failing element index
pub fn validate_list<T: Schema>(raw: Value) -> Result<Vec<T>> {
    let context = format!("{} list", T::KIND);
    let Value::Array(items) = raw else {
        return Err(schema_error(
            &context,
            "<root>",
            format!("has wrong type: expected array, found {}", json_type(&raw)),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| validate_at(item, &format!("{context}[{index}]")))
        .collect()
}

/// Validate a bare integer body, as returned by job-producing calls
pub fn validate_job_id(raw: Value, context: &str) -> Result<i64> {
    raw.as_i64().ok_or_else(|| {
        schema_error(
            context,
            "<root>",
            format!("has wrong type: expected integer job id, found {}", json_type(&raw)),
        )
    })
}

fn validate_at<T: Schema>(raw: Value, context: &str) -> Result<T> {
    let Some(object) = raw.as_object() else {
        return Err(schema_error(
            context,
            "<root>",
            format!("has wrong type: expected object, found {}", json_type(&raw)),
        ));
    };

    for field in T::FIELDS {
        field.check(object, context)?;
    }

    serde_json::from_value(raw).map_err(|e| schema_error(context, "<record>", e.to_string()))
}

fn schema_error(context: &str, field: &str, problem: String) -> SyncError {
    SyncError::Schema {
        context: context.to_string(),
        field: field.to_string(),
        problem,
    }
}

/// Like [`json_type`], but names arrays with non-string elements
fn describe_value(value: &Value) -> String {
    match value.as_array() {
        Some(items) if !items.iter().all(Value::is_string) => "array with non-string elements".to_string(),
        _ => json_type(value).to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
