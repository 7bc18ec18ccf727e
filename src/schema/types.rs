//! Core type definitions for user attribute schemas.
//!
//! This module contains the data structures that describe dynamic profile
//! attributes: their declared kind, constraints, and the stored row shape of
//! a validated value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Closed set of attribute kinds.
///
/// The textual form accepts the type names storage layers commonly use
/// (`varchar`, `bigint`, `jsonb`, ...) so schema rows map onto a kind without
/// a runtime lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum AttributeKind {
    /// Free text, optionally constrained by a pattern
    Text,
    /// Permissively parsed boolean
    Boolean,
    /// 64-bit signed integer
    Integer,
    /// Finite floating point number
    Decimal,
    /// Calendar date (`YYYY-MM-DD`)
    Date,
    /// Time of day (`HH:MM:SS[.fff]`)
    Time,
    /// RFC 3339 timestamp with offset
    Timestamp,
    /// UUID in hyphenated form
    Uuid,
    /// Opaque JSON document
    Document,
    /// Comma-joined list of text values
    List,
}

impl AttributeKind {
    /// All kinds, in declaration order.
    pub const ALL: [AttributeKind; 10] = [
        AttributeKind::Text,
        AttributeKind::Boolean,
        AttributeKind::Integer,
        AttributeKind::Decimal,
        AttributeKind::Date,
        AttributeKind::Time,
        AttributeKind::Timestamp,
        AttributeKind::Uuid,
        AttributeKind::Document,
        AttributeKind::List,
    ];

    /// Canonical name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Text => "text",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Integer => "integer",
            AttributeKind::Decimal => "decimal",
            AttributeKind::Date => "date",
            AttributeKind::Time => "time",
            AttributeKind::Timestamp => "timestamp",
            AttributeKind::Uuid => "uuid",
            AttributeKind::Document => "document",
            AttributeKind::List => "list",
        }
    }

    /// Whether validation patterns apply to values of this kind.
    pub fn is_text_like(&self) -> bool {
        matches!(self, AttributeKind::Text | AttributeKind::List)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a type name does not map to any kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown attribute type '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for AttributeKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "text" | "string" | "varchar" | "char" | "character varying" => AttributeKind::Text,
            "boolean" | "bool" => AttributeKind::Boolean,
            "integer" | "int" | "int4" | "int8" | "bigint" | "smallint" | "long" => {
                AttributeKind::Integer
            }
            "decimal" | "numeric" | "double" | "float" | "real" | "double precision" => {
                AttributeKind::Decimal
            }
            "date" => AttributeKind::Date,
            "time" => AttributeKind::Time,
            "timestamp" | "timestamptz" | "datetime" => AttributeKind::Timestamp,
            "uuid" => AttributeKind::Uuid,
            "document" | "json" | "jsonb" => AttributeKind::Document,
            "list" | "array" => AttributeKind::List,
            _ => return Err(UnknownKind(s.to_string())),
        };
        Ok(kind)
    }
}

impl TryFrom<String> for AttributeKind {
    type Error = UnknownKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AttributeKind> for &'static str {
    fn from(kind: AttributeKind) -> Self {
        kind.as_str()
    }
}

/// Definition of a user profile attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    /// Stable identifier, referenced by stored values
    pub id: Uuid,
    /// Attribute name, compared case-insensitively
    pub name: String,
    /// Declared kind of the attribute
    #[serde(rename = "type")]
    pub kind: AttributeKind,
    /// Whether new records must supply a value
    #[serde(default)]
    pub mandatory: bool,
    /// Whether a value may be held by at most one user
    #[serde(default)]
    pub unique: bool,
    /// Whether the value may be set only at creation
    #[serde(default)]
    pub read_only: bool,
    /// Regular expression values of text-like kinds must match in full
    #[serde(default)]
    pub validation_pattern: Option<String>,
    /// Registry-added (true) versus built-in (false)
    #[serde(default = "default_dynamic")]
    pub dynamic: bool,
}

fn default_dynamic() -> bool {
    true
}

impl AttributeDefinition {
    /// Create a dynamic attribute definition with a fresh id.
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            mandatory: false,
            unique: false,
            read_only: false,
            validation_pattern: None,
            dynamic: true,
        }
    }

    /// Mark the attribute as mandatory for new records.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Mark the attribute as unique across users.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark the attribute as read-only after creation.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Constrain values with a validation pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.validation_pattern = Some(pattern.into());
        self
    }

    /// Case-folded lookup key.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// A stored attribute value: one row per (user, attribute).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    pub user_id: Uuid,
    pub attribute_id: Uuid,
    /// Canonical string form produced by the codec
    pub value: String,
}
