//! Attribute validation against a schema snapshot.
//!
//! Validation runs four independent checks over a proposed set of
//! attributes and collects every violation before reporting:
//!
//! 1. unknown attributes
//! 2. missing mandatory attributes (new records only)
//! 3. values that do not decode as their kind or fail their pattern
//! 4. values of unique attributes already held by another user
//!
//! The first three are pure ([`AttributeValidator::evaluate`]); the fourth
//! needs one batched lookup against the value store.

use super::codec::{self, TypedValue};
use super::registry::AttributeSchemaRegistry;
use super::types::AttributeValue;
use crate::context::RequestContext;
use crate::directory::{AttributeValueStore, UniquenessProbe};
use crate::error::{AttributeViolation, EngineError, EngineResult};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Whether the attributes belong to a record being created or updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// A record being created; mandatory attributes must be present.
    New,
    /// An existing user; its own stored values never count as duplicates.
    Existing(Uuid),
}

impl RecordState {
    fn excluded_user(&self) -> Option<Uuid> {
        match self {
            RecordState::New => None,
            RecordState::Existing(user_id) => Some(*user_id),
        }
    }
}

/// A proposed value that passed type and pattern checks.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAttributeValue {
    pub attribute_id: Uuid,
    /// Canonical attribute name from the definition
    pub name: String,
    pub value: TypedValue,
    /// Stored form of `value`
    pub encoded: String,
}

/// Outcome of attribute validation in its serialized shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValidationResult {
    pub ok: bool,
    pub unknown: Vec<String>,
    pub missing_mandatory: Vec<String>,
    pub invalid: Vec<String>,
    pub duplicate: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read_only: Vec<String>,
}

impl AttributeValidationResult {
    fn from_lists(
        unknown: Vec<String>,
        missing_mandatory: Vec<String>,
        invalid: Vec<String>,
        duplicate: Vec<String>,
        read_only: Vec<String>,
    ) -> Self {
        let ok = unknown.is_empty()
            && missing_mandatory.is_empty()
            && invalid.is_empty()
            && duplicate.is_empty()
            && read_only.is_empty();
        Self {
            ok,
            unknown: sorted(unknown),
            missing_mandatory: sorted(missing_mandatory),
            invalid: sorted(invalid),
            duplicate: sorted(duplicate),
            read_only: sorted(read_only),
        }
    }

    /// Every non-empty check category as a violation.
    pub fn violations(&self) -> Vec<AttributeViolation> {
        let mut violations = Vec::new();
        if !self.unknown.is_empty() {
            violations.push(AttributeViolation::UnknownAttribute {
                attributes: self.unknown.clone(),
            });
        }
        if !self.missing_mandatory.is_empty() {
            violations.push(AttributeViolation::MissingMandatory {
                attributes: self.missing_mandatory.clone(),
            });
        }
        if !self.invalid.is_empty() {
            violations.push(AttributeViolation::InvalidValue {
                attributes: self.invalid.clone(),
            });
        }
        if !self.duplicate.is_empty() {
            violations.push(AttributeViolation::DuplicateValue {
                attributes: self.duplicate.clone(),
            });
        }
        if !self.read_only.is_empty() {
            violations.push(AttributeViolation::ReadOnlyAttribute {
                attributes: self.read_only.clone(),
            });
        }
        violations
    }
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names.dedup();
    names
}

/// Validation result plus the values ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValidation {
    pub result: AttributeValidationResult,
    /// Accepted values; only meaningful when `result.ok`
    pub values: Vec<EncodedAttributeValue>,
    /// Attributes a patch cleared with `null`
    pub cleared: Vec<Uuid>,
}

impl AttributeValidation {
    /// Whether every check passed.
    pub fn is_ok(&self) -> bool {
        self.result.ok
    }

    /// Stored rows for the accepted values of a user.
    pub fn into_rows(self, user_id: Uuid) -> Vec<AttributeValue> {
        self.values
            .into_iter()
            .map(|v| AttributeValue {
                user_id,
                attribute_id: v.attribute_id,
                value: v.encoded,
            })
            .collect()
    }
}

/// Findings of the pure checks, awaiting the uniqueness lookup.
#[derive(Debug, Clone)]
pub struct AttributeCheck {
    unknown: Vec<String>,
    missing_mandatory: Vec<String>,
    invalid: Vec<String>,
    read_only: Vec<String>,
    accepted: Vec<EncodedAttributeValue>,
    unique_ids: HashSet<Uuid>,
    cleared: Vec<Uuid>,
    probes: Vec<UniquenessProbe>,
    state: RecordState,
}

impl AttributeCheck {
    /// Values that must be checked against other users' stored values.
    pub fn probes(&self) -> &[UniquenessProbe] {
        &self.probes
    }

    /// Complete the check with the attribute ids the store reported as taken.
    pub fn finish(self, taken: &HashSet<Uuid>) -> AttributeValidation {
        let duplicate: Vec<String> = self
            .accepted
            .iter()
            .filter(|v| self.unique_ids.contains(&v.attribute_id) && taken.contains(&v.attribute_id))
            .map(|v| v.name.clone())
            .collect();

        let result = AttributeValidationResult::from_lists(
            self.unknown,
            self.missing_mandatory,
            self.invalid,
            duplicate,
            self.read_only,
        );
        AttributeValidation {
            result,
            values: self.accepted,
            cleared: self.cleared,
        }
    }
}

/// Validates proposed attributes against a registry snapshot.
#[derive(Debug, Clone, Copy)]
pub struct AttributeValidator<'a> {
    registry: &'a AttributeSchemaRegistry,
    enforce_read_only: bool,
}

impl<'a> AttributeValidator<'a> {
    /// Create a validator over a registry snapshot.
    pub fn new(registry: &'a AttributeSchemaRegistry) -> Self {
        Self {
            registry,
            enforce_read_only: false,
        }
    }

    /// Report changes to read-only attributes of existing records.
    pub fn enforce_read_only(mut self, enabled: bool) -> Self {
        self.enforce_read_only = enabled;
        self
    }

    /// Run the unknown, mandatory, and type/pattern checks.
    pub fn evaluate(&self, proposed: &Map<String, Value>, state: RecordState) -> AttributeCheck {
        let mut check = AttributeCheck {
            unknown: Vec::new(),
            missing_mandatory: Vec::new(),
            invalid: Vec::new(),
            read_only: Vec::new(),
            accepted: Vec::new(),
            unique_ids: HashSet::new(),
            cleared: Vec::new(),
            probes: Vec::new(),
            state,
        };
        // case-folded name -> whether a non-null value was supplied
        let mut seen: HashMap<String, bool> = HashMap::new();

        for (name, value) in proposed {
            let Some(definition) = self.registry.resolve(name) else {
                check.unknown.push(name.clone());
                continue;
            };
            let key = definition.key();
            if seen.insert(key.clone(), !value.is_null()).is_some() {
                debug!("Attribute '{}' supplied more than once", definition.name);
                check.invalid.push(definition.name.clone());
                continue;
            }

            if self.enforce_read_only && definition.read_only && state != RecordState::New {
                check.read_only.push(definition.name.clone());
                continue;
            }

            if value.is_null() {
                if state != RecordState::New {
                    check.cleared.push(definition.id);
                }
                continue;
            }

            let typed = match codec::from_wire(definition.kind, value) {
                Ok(typed) => typed,
                Err(e) => {
                    debug!("Attribute '{}' rejected: {}", definition.name, e);
                    check.invalid.push(definition.name.clone());
                    continue;
                }
            };

            let pattern = definition
                .kind
                .is_text_like()
                .then(|| self.registry.pattern(&key))
                .flatten();
            if let (Some(pattern), Some(subjects)) = (pattern, typed.pattern_subjects()) {
                if subjects.iter().any(|s| !pattern.is_match(s)) {
                    debug!(
                        "Attribute '{}' does not match its validation pattern",
                        definition.name
                    );
                    check.invalid.push(definition.name.clone());
                    continue;
                }
            }

            let encoded = typed.encode();
            trace!("Attribute '{}' encoded as '{}'", definition.name, encoded);
            if definition.unique {
                check.unique_ids.insert(definition.id);
                check.probes.push(UniquenessProbe {
                    attribute_id: definition.id,
                    name: definition.name.clone(),
                    encoded: encoded.clone(),
                });
            }
            check.accepted.push(EncodedAttributeValue {
                attribute_id: definition.id,
                name: definition.name.clone(),
                value: typed,
                encoded,
            });
        }

        if state == RecordState::New {
            for definition in self.registry.mandatory() {
                if !seen.get(&definition.key()).copied().unwrap_or(false) {
                    check.missing_mandatory.push(definition.name.clone());
                }
            }
        }

        check
    }

    /// Run all four checks, issuing at most one uniqueness lookup.
    pub async fn validate<S>(
        &self,
        ctx: &RequestContext,
        store: &S,
        proposed: &Map<String, Value>,
        state: RecordState,
    ) -> EngineResult<AttributeValidation>
    where
        S: AttributeValueStore,
    {
        let check = self.evaluate(proposed, state);

        let taken = if check.probes().is_empty() {
            HashSet::new()
        } else {
            store
                .find_existing(ctx, check.probes(), check.state.excluded_user())
                .await
                .map_err(|e| {
                    EngineError::collaborator(
                        "attribute_values.find_existing",
                        check.probes().iter().map(|p| p.name.as_str()),
                        e,
                    )
                })?
        };

        let validation = check.finish(&taken);
        if !validation.is_ok() {
            debug!(
                "Attribute validation failed for request {}: {:?}",
                ctx.request_id,
                validation.result.violations()
            );
        }
        Ok(validation)
    }
}
