//! Statically declared built-in user fields.
//!
//! Built-in fields are part of the user record itself rather than rows added
//! through metadata management. They are declared here as a table so metadata
//! responses and registries can be built without inspecting storage types.

use super::types::{AttributeDefinition, AttributeKind};
use uuid::Uuid;

/// Namespace for deriving stable ids of built-in fields.
const BUILTIN_NAMESPACE: Uuid = Uuid::from_u128(0x6d8e_3b1c_52a4_4f0e_9c71_1a2b_3c4d_5e6f);

/// Declaration of one built-in field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinField {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub mandatory: bool,
    pub unique: bool,
    pub read_only: bool,
    pub pattern: Option<&'static str>,
}

impl BuiltinField {
    const fn new(name: &'static str, kind: AttributeKind) -> Self {
        Self {
            name,
            kind,
            mandatory: false,
            unique: false,
            read_only: false,
            pattern: None,
        }
    }

    const fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    const fn pattern(mut self, pattern: &'static str) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Stable id of the field, identical across processes.
    pub fn id(&self) -> Uuid {
        Uuid::new_v5(&BUILTIN_NAMESPACE, self.name.as_bytes())
    }

    /// The field as an attribute definition.
    pub fn definition(&self) -> AttributeDefinition {
        AttributeDefinition {
            id: self.id(),
            name: self.name.to_string(),
            kind: self.kind,
            mandatory: self.mandatory,
            unique: self.unique,
            read_only: self.read_only,
            validation_pattern: self.pattern.map(str::to_string),
            dynamic: false,
        }
    }
}

/// Built-in fields of the user entity.
pub const USER_FIELDS: &[BuiltinField] = &[
    BuiltinField::new("id", AttributeKind::Uuid).read_only(),
    BuiltinField::new("username", AttributeKind::Text)
        .mandatory()
        .unique()
        .pattern(r"[A-Za-z0-9._@-]{3,64}"),
    BuiltinField::new("email", AttributeKind::Text)
        .unique()
        .pattern(r"[^@\s]+@[^@\s]+\.[^@\s]+"),
    BuiltinField::new("first_name", AttributeKind::Text),
    BuiltinField::new("last_name", AttributeKind::Text),
    BuiltinField::new("phone_number", AttributeKind::Text).pattern(r"\+?[0-9 ()-]{6,20}"),
    BuiltinField::new("locale", AttributeKind::Text).pattern(r"[a-z]{2}(-[A-Z]{2})?"),
    BuiltinField::new("enabled", AttributeKind::Boolean),
    BuiltinField::new("created_at", AttributeKind::Timestamp).read_only(),
    BuiltinField::new("last_modified", AttributeKind::Timestamp).read_only(),
];

/// Definitions of every built-in user field.
pub fn user_field_definitions() -> Vec<AttributeDefinition> {
    USER_FIELDS.iter().map(BuiltinField::definition).collect()
}

/// Look up a built-in user field by name (case-insensitive).
pub fn user_field(name: &str) -> Option<&'static BuiltinField> {
    USER_FIELDS
        .iter()
        .find(|field| field.name.eq_ignore_ascii_case(name))
}
