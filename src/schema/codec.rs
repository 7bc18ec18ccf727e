//! Conversion between wire values, typed values and stored strings.
//!
//! Three representations are involved:
//!
//! - the wire value, an arbitrary [`serde_json::Value`] supplied by a caller
//! - the typed value, a [`TypedValue`] whose variant matches an [`AttributeKind`]
//! - the canonical stored string written to an attribute value row
//!
//! [`from_wire`] and [`decode`] fail closed: anything that does not parse
//! exactly as the declared kind is rejected rather than truncated.
//!
//! List values are joined on [`LIST_DELIMITER`] without escaping, so elements
//! that contain the delimiter do not survive a round trip. Empty elements are
//! rejected, so the empty stored string always means the empty list.

use super::types::AttributeKind;
use crate::error::{CastError, CastResult};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde_json::Value;
use uuid::Uuid;

/// Delimiter used to join list elements in their stored form.
pub const LIST_DELIMITER: char = ',';

/// A value typed according to its attribute kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Text(String),
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<FixedOffset>),
    Uuid(Uuid),
    Document(Value),
    List(Vec<String>),
}

impl TypedValue {
    /// The kind this value belongs to.
    pub fn kind(&self) -> AttributeKind {
        match self {
            TypedValue::Text(_) => AttributeKind::Text,
            TypedValue::Boolean(_) => AttributeKind::Boolean,
            TypedValue::Integer(_) => AttributeKind::Integer,
            TypedValue::Decimal(_) => AttributeKind::Decimal,
            TypedValue::Date(_) => AttributeKind::Date,
            TypedValue::Time(_) => AttributeKind::Time,
            TypedValue::Timestamp(_) => AttributeKind::Timestamp,
            TypedValue::Uuid(_) => AttributeKind::Uuid,
            TypedValue::Document(_) => AttributeKind::Document,
            TypedValue::List(_) => AttributeKind::List,
        }
    }

    /// Canonical stored form of the value.
    pub fn encode(&self) -> String {
        match self {
            TypedValue::Text(s) => s.clone(),
            TypedValue::Boolean(b) => b.to_string(),
            TypedValue::Integer(i) => i.to_string(),
            TypedValue::Decimal(d) => d.to_string(),
            TypedValue::Date(d) => d.to_string(),
            TypedValue::Time(t) => t.to_string(),
            TypedValue::Timestamp(ts) => ts.to_rfc3339(),
            TypedValue::Uuid(u) => u.hyphenated().to_string(),
            TypedValue::Document(doc) => doc.to_string(),
            TypedValue::List(items) => items.join(&LIST_DELIMITER.to_string()),
        }
    }

    /// The value as it is returned to callers.
    pub fn to_wire(&self) -> Value {
        match self {
            TypedValue::Text(s) => Value::String(s.clone()),
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::Integer(i) => Value::from(*i),
            TypedValue::Decimal(d) => Value::from(*d),
            TypedValue::Document(doc) => doc.clone(),
            TypedValue::List(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            TypedValue::Date(_)
            | TypedValue::Time(_)
            | TypedValue::Timestamp(_)
            | TypedValue::Uuid(_) => Value::String(self.encode()),
        }
    }

    /// Elements a validation pattern applies to, if the kind is text-like.
    pub fn pattern_subjects(&self) -> Option<Vec<&str>> {
        match self {
            TypedValue::Text(s) => Some(vec![s.as_str()]),
            TypedValue::List(items) => Some(items.iter().map(String::as_str).collect()),
            _ => None,
        }
    }
}

/// Encode a typed value under a declared kind.
pub fn encode(kind: AttributeKind, value: &TypedValue) -> CastResult<String> {
    if value.kind() != kind {
        return Err(CastError::KindMismatch {
            expected: kind,
            actual: value.kind(),
        });
    }
    if let TypedValue::List(items) = value {
        reject_empty_elements(items)?;
    }
    Ok(value.encode())
}

/// Decode a stored string into a typed value of the given kind.
pub fn decode(kind: AttributeKind, raw: &str) -> CastResult<TypedValue> {
    let unparseable = |reason: String| CastError::Unparseable {
        kind,
        value: raw.to_string(),
        reason,
    };

    let value = match kind {
        AttributeKind::Text => TypedValue::Text(raw.to_string()),
        AttributeKind::Boolean => TypedValue::Boolean(
            parse_bool(raw).ok_or_else(|| unparseable("not a recognised boolean".to_string()))?,
        ),
        AttributeKind::Integer => {
            TypedValue::Integer(raw.parse::<i64>().map_err(|e| unparseable(e.to_string()))?)
        }
        AttributeKind::Decimal => {
            let parsed = raw.parse::<f64>().map_err(|e| unparseable(e.to_string()))?;
            if !parsed.is_finite() {
                return Err(unparseable("decimal must be finite".to_string()));
            }
            TypedValue::Decimal(parsed)
        }
        AttributeKind::Date => {
            TypedValue::Date(raw.parse::<NaiveDate>().map_err(|e| unparseable(e.to_string()))?)
        }
        AttributeKind::Time => {
            TypedValue::Time(raw.parse::<NaiveTime>().map_err(|e| unparseable(e.to_string()))?)
        }
        AttributeKind::Timestamp => TypedValue::Timestamp(
            DateTime::parse_from_rfc3339(raw).map_err(|e| unparseable(e.to_string()))?,
        ),
        AttributeKind::Uuid => {
            TypedValue::Uuid(Uuid::parse_str(raw).map_err(|e| unparseable(e.to_string()))?)
        }
        AttributeKind::Document => TypedValue::Document(
            serde_json::from_str::<Value>(raw).map_err(|e| unparseable(e.to_string()))?,
        ),
        AttributeKind::List => {
            let items = split_list(raw);
            reject_empty_elements(&items)?;
            TypedValue::List(items)
        }
    };
    Ok(value)
}

/// Convert a wire value into a typed value of the given kind.
pub fn from_wire(kind: AttributeKind, value: &Value) -> CastResult<TypedValue> {
    let unexpected = || CastError::UnexpectedWireType {
        kind,
        found: json_type_name(value),
    };

    match (kind, value) {
        (_, Value::Null) => Err(unexpected()),

        (AttributeKind::Text, Value::String(s)) => Ok(TypedValue::Text(s.clone())),
        (AttributeKind::Text, Value::Number(n)) => Ok(TypedValue::Text(n.to_string())),
        (AttributeKind::Text, Value::Bool(b)) => Ok(TypedValue::Text(b.to_string())),

        (AttributeKind::Boolean, Value::Bool(b)) => Ok(TypedValue::Boolean(*b)),
        (AttributeKind::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(TypedValue::Boolean(false)),
            Some(1) => Ok(TypedValue::Boolean(true)),
            _ => Err(CastError::Unparseable {
                kind,
                value: n.to_string(),
                reason: "only 0 and 1 are accepted as booleans".to_string(),
            }),
        },

        (AttributeKind::Integer, Value::Number(n)) => {
            n.as_i64()
                .map(TypedValue::Integer)
                .ok_or_else(|| CastError::Unparseable {
                    kind,
                    value: n.to_string(),
                    reason: "not a 64-bit signed integer".to_string(),
                })
        }

        (AttributeKind::Decimal, Value::Number(n)) => n
            .as_f64()
            .filter(|d| d.is_finite())
            .map(TypedValue::Decimal)
            .ok_or_else(|| CastError::Unparseable {
                kind,
                value: n.to_string(),
                reason: "not a finite decimal".to_string(),
            }),

        (AttributeKind::Document, Value::String(s)) => decode(kind, s),
        (AttributeKind::Document, other) => Ok(TypedValue::Document(other.clone())),

        (AttributeKind::List, Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                other => Err(CastError::UnexpectedWireType {
                    kind,
                    found: json_type_name(other),
                }),
            })
            .collect::<CastResult<Vec<_>>>()
            .and_then(|items| {
                reject_empty_elements(&items)?;
                Ok(TypedValue::List(items))
            }),

        // Every remaining kind reads its textual form.
        (_, Value::String(s)) => decode(kind, s),

        _ => Err(unexpected()),
    }
}

/// Permissive boolean parse.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn reject_empty_elements(items: &[String]) -> CastResult<()> {
    match items.iter().position(String::is_empty) {
        Some(index) => Err(CastError::Unparseable {
            kind: AttributeKind::List,
            value: items.join(&LIST_DELIMITER.to_string()),
            reason: format!("element {} is empty", index),
        }),
        None => Ok(()),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(LIST_DELIMITER).map(str::to_string).collect()
}

/// Get the type name of a JSON value for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() => "integer",
        Value::Number(_) => "decimal",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
