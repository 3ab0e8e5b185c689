use crate::foundation::color::parse_hex_color;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Value kinds a props field may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Any JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A JSON number with no fractional part.
    Integer,
    /// `true` / `false`.
    Boolean,
    /// A hex colour string (`#rgb`, `#rrggbb`, `#rrggbbaa`).
    Color,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
    /// Anything, including `null`.
    Any,
}

impl FieldKind {
    fn expected(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Color => "color",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
        }
    }

    fn accepts(self, v: &Value) -> bool {
        match self {
            Self::String => v.is_string(),
            Self::Number => v.is_number(),
            Self::Integer => v.is_i64() || v.is_u64(),
            Self::Boolean => v.is_boolean(),
            Self::Color => v.as_str().is_some_and(|s| parse_hex_color(s).is_ok()),
            Self::Object => v.is_object(),
            Self::Array => v.is_array(),
            Self::Any => true,
        }
    }
}

/// One declared props field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Expected value kind.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Field may be absent.
    #[serde(default)]
    pub optional: bool,
}

impl FieldSchema {
    /// A required field of `kind`.
    pub fn required(kind: FieldKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    /// An optional field of `kind`.
    pub fn optional(kind: FieldKind) -> Self {
        Self {
            kind,
            optional: true,
        }
    }
}

/// Schema for a composition's props object, owned by the page content.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropsSchema {
    /// Declared fields.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSchema>,
    /// Accept keys that are not declared in `fields`.
    #[serde(default)]
    pub allow_unknown: bool,
}

impl PropsSchema {
    /// Schema that accepts any props object.
    pub fn permissive() -> Self {
        Self {
            fields: BTreeMap::new(),
            allow_unknown: true,
        }
    }

    /// Builder-style field declaration.
    pub fn field(mut self, name: impl Into<String>, field: FieldSchema) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Validate a props value, collecting every violation.
    pub fn validate(&self, props: &Value) -> Result<(), SchemaErrors> {
        let Some(obj) = props.as_object() else {
            return Err(SchemaErrors {
                errors: vec![SchemaError::root("props must be a JSON object")],
            });
        };

        let mut errors = Vec::new();
        for (name, field) in &self.fields {
            match obj.get(name) {
                None if field.optional => {}
                None => errors.push(SchemaError::at(name, "required field is missing")),
                Some(v) if !field.kind.accepts(v) => errors.push(SchemaError::at(
                    name,
                    format!("expected {}, got {}", field.kind.expected(), describe(v)),
                )),
                Some(_) => {}
            }
        }
        if !self.allow_unknown {
            for key in obj.keys() {
                if !self.fields.contains_key(key) {
                    errors.push(SchemaError::at(key, "unknown field"));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaErrors { errors })
        }
    }
}

fn describe(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single schema violation, addressed by a `$.field` path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaError {
    /// Offending field, or `None` for the props object itself.
    pub field: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl SchemaError {
    fn root(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    fn at(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.to_owned()),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(name) => write!(f, "$.{name}: {}", self.message),
            None => write!(f, "$: {}", self.message),
        }
    }
}

/// All violations found in one props value.
#[derive(Clone, Debug)]
pub struct SchemaErrors {
    /// Violations in field order.
    pub errors: Vec<SchemaError>,
}

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaErrors {}

#[cfg(test)]
#[path = "../../tests/unit/composition/schema.rs"]
mod tests;
