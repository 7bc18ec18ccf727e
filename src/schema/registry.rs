//! Attribute schema registry for resolving and managing attribute definitions.
//!
//! The registry is a snapshot: it is built from the definitions a schema
//! store returns, used for one validation pass, and never written back by the
//! engine. Metadata management ([`AttributeSchemaRegistry::define`] and
//! [`AttributeSchemaRegistry::retire`]) produces a new definition set the
//! caller persists.

use super::builtin;
use super::types::AttributeDefinition;
use crate::error::{SchemaError, SchemaResult};

use regex::Regex;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// A definition together with its compiled validation pattern.
#[derive(Debug, Clone)]
struct RegisteredAttribute {
    definition: AttributeDefinition,
    pattern: Option<Regex>,
}

/// Registry of attribute definitions keyed by case-folded name.
#[derive(Debug, Clone, Default)]
pub struct AttributeSchemaRegistry {
    attributes: BTreeMap<String, RegisteredAttribute>,
}

impl AttributeSchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding only the built-in user fields.
    pub fn with_builtin_fields() -> SchemaResult<Self> {
        Self::from_definitions(builtin::user_field_definitions())
    }

    /// Build a registry from a definition snapshot.
    ///
    /// Fails if two definitions share a name or a pattern does not compile.
    pub fn from_definitions<I>(definitions: I) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = AttributeDefinition>,
    {
        let mut attributes = BTreeMap::new();
        for definition in definitions {
            let key = definition.key();
            if attributes.contains_key(&key) {
                return Err(SchemaError::DuplicateName {
                    name: definition.name,
                });
            }
            let registered = Self::register(definition)?;
            attributes.insert(key, registered);
        }
        Ok(Self { attributes })
    }

    /// Load a registry from a JSON array of definitions.
    pub fn from_json(content: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let definitions: Vec<AttributeDefinition> = serde_json::from_str(content)?;
        Ok(Self::from_definitions(definitions)?)
    }

    fn register(definition: AttributeDefinition) -> SchemaResult<RegisteredAttribute> {
        if definition.name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        let pattern = match &definition.validation_pattern {
            Some(pattern) => Some(Self::compile_pattern(&definition.name, pattern)?),
            None => None,
        };
        Ok(RegisteredAttribute {
            definition,
            pattern,
        })
    }

    /// Compile a pattern so that it must match the whole value.
    fn compile_pattern(name: &str, pattern: &str) -> SchemaResult<Regex> {
        Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| SchemaError::InvalidPattern {
            name: name.to_string(),
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
    }

    /// Resolve a definition by name (case-insensitive).
    pub fn resolve(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes
            .get(&name.to_lowercase())
            .map(|a| &a.definition)
    }

    /// Compiled, anchored validation pattern of an attribute.
    pub fn pattern(&self, name: &str) -> Option<&Regex> {
        self.attributes
            .get(&name.to_lowercase())
            .and_then(|a| a.pattern.as_ref())
    }

    /// All definitions, ordered by case-folded name.
    pub fn definitions(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.attributes.values().map(|a| &a.definition)
    }

    /// Definitions that new records must supply.
    pub fn mandatory(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.definitions().filter(|d| d.mandatory)
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the registry holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Add or replace a dynamic attribute definition.
    ///
    /// Replacing keeps the id of the existing definition so stored values
    /// stay attached to it. Built-in fields cannot be redefined.
    pub fn define(&mut self, mut definition: AttributeDefinition) -> SchemaResult<&AttributeDefinition> {
        if !definition.dynamic {
            return Err(SchemaError::NotDynamic {
                name: definition.name,
            });
        }
        let key = definition.key();
        if let Some(existing) = self.attributes.get(&key) {
            if !existing.definition.dynamic {
                return Err(SchemaError::BuiltinField {
                    name: existing.definition.name.clone(),
                });
            }
            definition.id = existing.definition.id;
        } else if builtin::user_field(&definition.name).is_some() {
            return Err(SchemaError::BuiltinField {
                name: definition.name,
            });
        }

        let registered = Self::register(definition)?;
        log::debug!(
            "Defined attribute '{}' as {}",
            registered.definition.name,
            registered.definition.kind
        );
        let slot = match self.attributes.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.insert(registered);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(registered),
        };
        Ok(&slot.definition)
    }

    /// Remove a dynamic attribute definition.
    pub fn retire(&mut self, name: &str) -> SchemaResult<AttributeDefinition> {
        let Entry::Occupied(entry) = self.attributes.entry(name.to_lowercase()) else {
            return Err(SchemaError::UnknownAttribute {
                name: name.to_string(),
            });
        };
        if !entry.get().definition.dynamic {
            return Err(SchemaError::BuiltinField {
                name: entry.get().definition.name.clone(),
            });
        }
        let removed = entry.remove().definition;
        log::debug!("Retired attribute '{}'", removed.name);
        Ok(removed)
    }

    /// The static table of built-in user fields.
    pub fn builtin_user_fields() -> &'static [builtin::BuiltinField] {
        builtin::USER_FIELDS
    }

    /// Consume the registry, returning its definitions for persistence.
    pub fn into_definitions(self) -> Vec<AttributeDefinition> {
        self.attributes.into_values().map(|a| a.definition).collect()
    }
}
