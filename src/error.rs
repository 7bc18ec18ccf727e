//! Error types for entitlement engine operations.
//!
//! Two families live here. [`EngineError`] is returned as `Err` and means the
//! engine could not reach a verdict: a collaborator failed, stored data is
//! inconsistent, or the engine was misconfigured. [`AttributeViolation`] and
//! [`AssociationRejection`] are verdicts: they are carried inside successful
//! results and describe what the caller has to correct.

use crate::association::ChangeRequestError;
use crate::schema::AttributeKind;
use uuid::Uuid;

/// Main error type for entitlement engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A role referenced by an association or a request no longer resolves.
    ///
    /// This is a data-integrity failure and is never reported as a
    /// permission denial.
    #[error("Unresolved roles while evaluating permissions for {principal}: {roles:?}")]
    UnresolvedRole { principal: Uuid, roles: Vec<String> },

    /// A collaborator (store or resolver) call failed.
    #[error("Collaborator lookup '{lookup}' failed for [{keys}]: {source}")]
    Collaborator {
        lookup: &'static str,
        keys: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The attribute schema snapshot is unusable.
    #[error("Invalid attribute schema: {0}")]
    InvalidSchema(#[from] SchemaError),

    /// Engine configuration is invalid.
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },
}

/// Errors raised by the value codec.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CastError {
    /// The wire value has a JSON shape the kind cannot accept.
    #[error("Cannot read a JSON {found} as {kind}")]
    UnexpectedWireType {
        kind: AttributeKind,
        found: &'static str,
    },

    /// The textual form does not parse as the kind.
    #[error("'{value}' is not a valid {kind}: {reason}")]
    Unparseable {
        kind: AttributeKind,
        value: String,
        reason: String,
    },

    /// A native value was handed to the codec under a different kind.
    #[error("A {actual} value cannot be encoded as {expected}")]
    KindMismatch {
        expected: AttributeKind,
        actual: AttributeKind,
    },
}

/// Errors raised by attribute metadata management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Definition name is empty or whitespace.
    #[error("Attribute definition name cannot be empty")]
    EmptyName,

    /// Validation pattern does not compile.
    #[error("Attribute '{name}' has an invalid validation pattern '{pattern}': {reason}")]
    InvalidPattern {
        name: String,
        pattern: String,
        reason: String,
    },

    /// Built-in fields are declared statically and cannot be changed.
    #[error("Attribute '{name}' is a built-in field and cannot be redefined or retired")]
    BuiltinField { name: String },

    /// Built-in fields must be declared with `dynamic = false` and vice versa.
    #[error("Attribute '{name}' must be registered as a dynamic attribute")]
    NotDynamic { name: String },

    /// No definition with that name.
    #[error("Attribute '{name}' is not defined")]
    UnknownAttribute { name: String },

    /// Two definitions share a name (names compare case-insensitively).
    #[error("Attribute '{name}' is defined more than once")]
    DuplicateName { name: String },
}

/// Attribute validation verdicts, one per check category.
///
/// Every variant carries the complete list of offending attribute names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeViolation {
    #[error("Unknown attributes: {attributes:?}")]
    UnknownAttribute { attributes: Vec<String> },

    #[error("Missing mandatory attributes: {attributes:?}")]
    MissingMandatory { attributes: Vec<String> },

    #[error("Invalid attribute values: {attributes:?}")]
    InvalidValue { attributes: Vec<String> },

    #[error("Attribute values already in use: {attributes:?}")]
    DuplicateValue { attributes: Vec<String> },

    #[error("Read-only attributes cannot be changed: {attributes:?}")]
    ReadOnlyAttribute { attributes: Vec<String> },
}

/// Association reconciliation verdicts. Each one rejects the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssociationRejection {
    /// Accounts or roles named in the batch do not exist.
    #[error("Batch references unknown accounts or roles ({} errors)", errors.len())]
    InvalidAssociationReference { errors: Vec<ChangeRequestError> },

    /// Requests whose precondition does not hold against the current state.
    #[error("Batch contains invalid operations ({} errors)", errors.len())]
    InvalidAssociationOperation { errors: Vec<ChangeRequestError> },

    /// The batch would leave the user with no association at all.
    #[error("User {user_id} cannot be left without any account/role association")]
    CannotFullyDisassociate { user_id: Uuid },

    /// The acting principal may not grant or revoke the touched roles.
    #[error("Principal {acting_user} is not permitted to modify roles {roles:?}")]
    PermissionDenied { acting_user: Uuid, roles: Vec<String> },
}

// Convenience methods for creating common errors
impl EngineError {
    /// Wrap a collaborator failure with the lookup that failed and its keys.
    pub fn collaborator<E, K>(lookup: &'static str, keys: K, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
        K: IntoIterator,
        K::Item: std::fmt::Display,
    {
        Self::Collaborator {
            lookup,
            keys: keys
                .into_iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            source: Box::new(error),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl AttributeViolation {
    /// Names of the offending attributes.
    pub fn attributes(&self) -> &[String] {
        match self {
            Self::UnknownAttribute { attributes }
            | Self::MissingMandatory { attributes }
            | Self::InvalidValue { attributes }
            | Self::DuplicateValue { attributes }
            | Self::ReadOnlyAttribute { attributes } => attributes,
        }
    }
}

impl AssociationRejection {
    /// Stable machine-readable kind, used in serialized results.
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::InvalidAssociationReference { .. } => RejectionKind::InvalidAssociationReference,
            Self::InvalidAssociationOperation { .. } => RejectionKind::InvalidAssociationOperation,
            Self::CannotFullyDisassociate { .. } => RejectionKind::CannotFullyDisassociate,
            Self::PermissionDenied { .. } => RejectionKind::PermissionDenied,
        }
    }
}

/// Machine-readable association rejection kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    InvalidAssociationReference,
    InvalidAssociationOperation,
    CannotFullyDisassociate,
    PermissionDenied,
}

// Result type aliases for convenience
pub type EngineResult<T> = Result<T, EngineError>;
pub type CastResult<T> = Result<T, CastError>;
pub type SchemaResult<T> = Result<T, SchemaError>;
