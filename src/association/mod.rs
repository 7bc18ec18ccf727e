//! Account/role associations and batch reconciliation.
//!
//! A user's entitlements are a set of (account, role) associations. Changes
//! arrive as batches of [`AssociationChangeRequest`]s which the
//! [`AssociationReconciler`] turns into a new complete set, or rejects as a
//! whole.
//!
//! # Batch semantics
//!
//! - Requests are applied in priority order regardless of submission order:
//!   specific removals, then account-wide removals, then additions
//! - Every precondition is judged against the state before the batch
//! - Identical requests collapse into one
//! - A batch that would leave a user with no association is rejected

pub mod reconciler;
pub mod types;


pub use reconciler::{
    AssociationChanges, AssociationReconciler, Reconciliation, ReconciliationResult,
    ReconciliationSubject,
};
pub use types::{
    ALL_ROLES_MARKER, AccountRoleAssociation, AssociationChangeRequest, AssociationPair,
    AssociationTarget, ChangeErrorReason, ChangeOperation, ChangeRequestError,
    RequestedAssociation,
};
