//! Association and change-request types.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Wire form of the "every role on this account" target.
pub const ALL_ROLES_MARKER: &str = "*";

/// A (user, account, role) grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRoleAssociation {
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub role_id: Uuid,
}

impl AccountRoleAssociation {
    pub fn new(user_id: Uuid, account_id: Uuid, role_id: Uuid) -> Self {
        Self {
            user_id,
            account_id,
            role_id,
        }
    }

    /// The association without its user.
    pub fn pair(&self) -> AssociationPair {
        AssociationPair {
            account_id: self.account_id,
            role_id: self.role_id,
        }
    }
}

/// An (account, role) pair as returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationPair {
    pub account_id: Uuid,
    pub role_id: Uuid,
}

/// Kind of association change.
///
/// Operations are applied in priority order: specific removals, then
/// account-wide removals, then additions. The order is defined by
/// [`ChangeOperation::priority`], not by declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    RemoveSpecific,
    RemoveAllForAccount,
    Add,
}

impl ChangeOperation {
    /// Position of the operation in a batch; lower runs first.
    pub fn priority(&self) -> u8 {
        match self {
            ChangeOperation::RemoveSpecific => 1,
            ChangeOperation::RemoveAllForAccount => 2,
            ChangeOperation::Add => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::RemoveSpecific => "remove_specific",
            ChangeOperation::RemoveAllForAccount => "remove_all_for_account",
            ChangeOperation::Add => "add",
        }
    }
}

impl Ord for ChangeOperation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl PartialOrd for ChangeOperation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role named by a change request.
///
/// On the wire this is a plain string: a role name, or [`ALL_ROLES_MARKER`]
/// (an empty string reads as the marker too).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssociationTarget {
    Role(String),
    AllRoles,
}

impl AssociationTarget {
    pub fn role_name(&self) -> Option<&str> {
        match self {
            AssociationTarget::Role(name) => Some(name),
            AssociationTarget::AllRoles => None,
        }
    }
}

impl From<String> for AssociationTarget {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == ALL_ROLES_MARKER {
            AssociationTarget::AllRoles
        } else {
            AssociationTarget::Role(value)
        }
    }
}

impl From<AssociationTarget> for String {
    fn from(target: AssociationTarget) -> Self {
        match target {
            AssociationTarget::Role(name) => name,
            AssociationTarget::AllRoles => ALL_ROLES_MARKER.to_string(),
        }
    }
}

impl fmt::Display for AssociationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssociationTarget::Role(name) => f.write_str(name),
            AssociationTarget::AllRoles => f.write_str(ALL_ROLES_MARKER),
        }
    }
}

/// One requested change to a user's associations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationChangeRequest {
    /// Account id or account name
    pub account_ref: String,
    pub target: AssociationTarget,
    pub op: ChangeOperation,
}

impl AssociationChangeRequest {
    /// Grant `role` on `account`.
    pub fn add(account_ref: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            account_ref: account_ref.into(),
            target: AssociationTarget::Role(role.into()),
            op: ChangeOperation::Add,
        }
    }

    /// Revoke `role` on `account`.
    pub fn remove_specific(account_ref: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            account_ref: account_ref.into(),
            target: AssociationTarget::Role(role.into()),
            op: ChangeOperation::RemoveSpecific,
        }
    }

    /// Revoke every role on `account`.
    pub fn remove_all_for_account(account_ref: impl Into<String>) -> Self {
        Self {
            account_ref: account_ref.into(),
            target: AssociationTarget::AllRoles,
            op: ChangeOperation::RemoveAllForAccount,
        }
    }

    /// Error entry for this request.
    pub fn error(&self, reason: ChangeErrorReason) -> ChangeRequestError {
        ChangeRequestError {
            account_ref: self.account_ref.clone(),
            target: self.target.to_string(),
            op: self.op,
            reason,
        }
    }
}

/// An (account, role) pair requested for a user being created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedAssociation {
    /// Account id or account name
    pub account_ref: String,
    pub role: String,
}

impl RequestedAssociation {
    pub fn new(account_ref: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            account_ref: account_ref.into(),
            role: role.into(),
        }
    }

    /// The equivalent addition request.
    pub fn as_change(&self) -> AssociationChangeRequest {
        AssociationChangeRequest::add(self.account_ref.clone(), self.role.clone())
    }
}

/// Why a change request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeErrorReason {
    UnknownAccount,
    UnknownRole,
    RoleTargetRequired,
    AllRolesTargetRequired,
    AssociationExists,
    AssociationMissing,
    AccountHasNoAssociations,
    WouldRemoveAllAssociations,
    PermissionDenied,
}

impl fmt::Display for ChangeErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ChangeErrorReason::UnknownAccount => "account does not exist",
            ChangeErrorReason::UnknownRole => "role does not exist",
            ChangeErrorReason::RoleTargetRequired => "operation requires a role name",
            ChangeErrorReason::AllRolesTargetRequired => {
                "operation applies to every role and takes no role name"
            }
            ChangeErrorReason::AssociationExists => "user already holds this role on the account",
            ChangeErrorReason::AssociationMissing => "user does not hold this role on the account",
            ChangeErrorReason::AccountHasNoAssociations => "user holds no role on the account",
            ChangeErrorReason::WouldRemoveAllAssociations => {
                "user would be left without any association"
            }
            ChangeErrorReason::PermissionDenied => "not permitted to modify this role",
        };
        f.write_str(message)
    }
}

/// A rejected change request with the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequestError {
    pub account_ref: String,
    pub target: String,
    pub op: ChangeOperation,
    pub reason: ChangeErrorReason,
}
