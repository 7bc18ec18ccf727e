//! Attribute schema, value codec and attribute validation.
//!
//! This module provides the schema registry describing which attributes a
//! user may carry, the codec converting attribute values between their
//! wire, native and stored forms, and the validator applying the schema to
//! proposed attributes.
//!
//! # Key Types
//!
//! - [`AttributeDefinition`] - One attribute: kind, constraints and pattern
//! - [`AttributeSchemaRegistry`] - Case-insensitive snapshot of definitions
//! - [`TypedValue`] - A decoded attribute value
//! - [`AttributeValidator`] - Runs every attribute check in one pass
//!
//! # Examples
//!
//! ```rust
//! use entitlement_engine::schema::{AttributeDefinition, AttributeKind, AttributeSchemaRegistry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = AttributeSchemaRegistry::with_builtin_fields()?;
//! registry.define(AttributeDefinition::new("cost_center", AttributeKind::Integer).mandatory())?;
//!
//! let definition = registry.resolve("Cost_Center").unwrap();
//! assert_eq!(definition.kind, AttributeKind::Integer);
//! # Ok(())
//! # }
//! ```

pub mod builtin;
pub mod codec;
pub mod registry;
pub mod types;
pub mod validation;


// Re-export the main types for convenience
pub use builtin::{BuiltinField, USER_FIELDS, user_field, user_field_definitions};
pub use codec::TypedValue;
pub use registry::AttributeSchemaRegistry;
pub use types::{AttributeDefinition, AttributeKind, AttributeValue, UnknownKind};
pub use validation::{
    AttributeCheck, AttributeValidation, AttributeValidationResult, AttributeValidator,
    EncodedAttributeValue, RecordState,
};
