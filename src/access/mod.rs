//! Roles, scopes and the permission check that guards role changes.
//!
//! Roles and accounts are reference entities owned elsewhere; the engine
//! only reads them. A [`Principal`] is the acting user with its roles
//! flattened into a scope set for the duration of one check.

pub mod evaluator;


pub use evaluator::{PermissionDecision, PermissionEvaluator, PermitReason};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A role and the scopes it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub scopes: BTreeSet<String>,
}

impl Role {
    /// Create a role with a fresh id.
    pub fn new<I, S>(name: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }
}

/// An account users are associated with through roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
}

impl Account {
    /// Create an account with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// The acting user of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    /// Names of the roles the user currently holds
    pub roles: BTreeSet<String>,
    /// Union of the scopes granted by those roles
    pub scopes: BTreeSet<String>,
}
