//! The `pass.json` document.

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;

/// A field that must be present in every pass document, with its expected JSON type.
#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Integer,
    String,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::String => value.is_string(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::String => "string",
        }
    }
}

const REQUIRED_FIELDS: [(&str, FieldKind); 5] = [
    ("formatVersion", FieldKind::Integer),
    ("organizationName", FieldKind::String),
    ("passTypeIdentifier", FieldKind::String),
    ("serialNumber", FieldKind::String),
    ("teamIdentifier", FieldKind::String),
];

/// One reason a pass document fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A required top-level field is absent.
    Missing(&'static str),
    /// A required field is present but holds the wrong JSON type.
    WrongType {
        /// Field name.
        field: &'static str,
        /// Expected JSON type.
        expected: &'static str,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Missing(field) => write!(f, "missing required field `{field}`"),
            Violation::WrongType { field, expected } => {
                write!(f, "field `{field}` must be a {expected}")
            }
        }
    }
}

/// Ordered key/value pass document, serialized as `pass.json`.
///
/// Keys keep their insertion order so the serialized document reads the way
/// it was written.
///
/// # Examples
///
/// ```
/// use pkpass::PassData;
/// use serde_json::json;
///
/// let mut data = PassData::new();
/// data.set("formatVersion", json!(1));
/// data.set("organizationName", json!("Flight Express"));
/// assert!(data.validate().is_err()); // serial number etc. still missing
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassData {
    fields: Map<String, Value>,
}

impl PassData {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value. The value must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(Error::Validation(vec![Violation::WrongType {
                field: "pass.json",
                expected: "JSON object",
            }])),
        }
    }

    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Set a top-level field, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Shallow merge: top-level fields of `other` overwrite ours.
    pub fn merge(&mut self, other: PassData) -> &mut Self {
        for (key, value) in other.fields {
            self.fields.insert(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.get("serialNumber").and_then(Value::as_str)
    }

    pub fn pass_type_identifier(&self) -> Option<&str> {
        self.get("passTypeIdentifier").and_then(Value::as_str)
    }

    /// Every missing or mistyped required field, in a fixed order.
    pub fn violations(&self) -> Vec<Violation> {
        REQUIRED_FIELDS
            .iter()
            .filter_map(|&(field, kind)| match self.fields.get(field) {
                None | Some(Value::Null) => Some(Violation::Missing(field)),
                Some(value) if !kind.matches(value) => Some(Violation::WrongType {
                    field,
                    expected: kind.name(),
                }),
                Some(_) => None,
            })
            .collect()
    }

    /// Check that the document carries every field a pass reader requires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing all violations.
    pub fn validate(&self) -> Result<()> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(violations))
        }
    }

    /// Serialize to the exact bytes stored as `pass.json`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.fields)?)
    }
}

impl TryFrom<Value> for PassData {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}
