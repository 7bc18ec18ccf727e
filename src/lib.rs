//! Entitlement and attribute reconciliation engine.
//!
//! Validates user profile attributes against a per-tenant attribute schema
//! and reconciles batches of account/role association changes, checking that
//! the acting principal may grant or revoke every role involved.
//!
//! # Core Components
//!
//! - [`EntitlementEngine`] - Create and patch flows combining both checks
//! - [`schema`] - Attribute definitions, value codec and attribute validator
//! - [`association`] - Change requests and the association reconciler
//! - [`access`] - Roles, scopes and the permission evaluator
//! - [`directory`] - Collaborator traits and an in-memory implementation
//!
//! The engine persists nothing. Accepted attribute rows and association sets
//! are returned to the caller, which writes them to its own storage.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use entitlement_engine::{CreateUserRequest, EntitlementEngine, RequestContext};
//! use entitlement_engine::access::{Account, Role};
//! use entitlement_engine::directory::InMemoryDirectory;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = InMemoryDirectory::new().with_builtin_fields("acme").await;
//! directory.add_account("acme", Account::new("headquarters")).await;
//! directory.add_role("acme", Role::new("member", ["profile:read"])).await;
//!
//! let engine = EntitlementEngine::new(directory)?;
//! let ctx = RequestContext::with_generated_id("acme");
//!
//! let attributes = json!({ "username": "jdoe" }).as_object().cloned().unwrap_or_default();
//! let request = CreateUserRequest::new(attributes).with_association("headquarters", "member");
//!
//! let outcome = engine.create_user(&ctx, &request).await?;
//! if outcome.is_ok() {
//!     let _rows = outcome.attribute_rows();
//!     let _associations = outcome.new_associations();
//! }
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod association;
pub mod context;
pub mod directory;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod schema;

// Re-export commonly used types for convenience
pub use access::{Account, PermissionDecision, PermissionEvaluator, Principal, Role};
pub use association::{
    AccountRoleAssociation, AssociationChangeRequest, AssociationReconciler, ChangeOperation,
    Reconciliation, ReconciliationResult, ReconciliationSubject, RequestedAssociation,
};
pub use context::RequestContext;
pub use directory::{
    AccountResolver, AttributeSchemaStore, AttributeValueStore, EntitlementDirectory,
    InMemoryDirectory, PrincipalStore, RoleScopeResolver,
};
pub use engine::{
    CreateUserRequest, EngineConfig, EntitlementEngine, EntitlementEngineBuilder,
    EntitlementOutcome, EntitlementResult, PatchUserRequest,
};
pub use error::{
    AssociationRejection, AttributeViolation, CastError, EngineError, EngineResult,
    RejectionKind, SchemaError,
};
pub use lookup::LookupCache;
pub use schema::{
    AttributeDefinition, AttributeKind, AttributeSchemaRegistry, AttributeValidationResult,
    AttributeValidator, AttributeValue, RecordState, TypedValue,
};
