//! Collaborator interfaces consumed by the engine.
//!
//! The engine owns no persistence. Attribute definitions, stored values,
//! roles, accounts and current associations are read through the traits in
//! this module, each of which a host implements over its own storage.
//!
//! # Design Principles
//!
//! - **Read-only**: the engine only reads through these traits; new state is
//!   handed back to the caller for persistence
//! - **Tenant scoped**: every call receives the [`RequestContext`] of the
//!   request it serves
//! - **Batched**: lookups take every key at once so one request never fans
//!   out into one call per key
//! - **Missing is not an error**: resolvers omit keys they cannot resolve;
//!   the engine decides what an absent key means
//!
//! [`InMemoryDirectory`] implements every trait and is suitable for tests and
//! single-process deployments.

pub mod in_memory;

pub use in_memory::{DirectoryCall, InMemoryDirectory, InMemoryDirectoryError};

use crate::access::{Account, Role};
use crate::association::AccountRoleAssociation;
use crate::context::RequestContext;
use crate::schema::AttributeDefinition;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use uuid::Uuid;

/// One value of a unique attribute to check against stored values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniquenessProbe {
    pub attribute_id: Uuid,
    /// Attribute name, for error context
    pub name: String,
    /// Canonical stored form of the proposed value
    pub encoded: String,
}

/// Source of attribute definitions.
pub trait AttributeSchemaStore: Send + Sync {
    /// The error type returned by schema lookups.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every attribute definition of the tenant, built-in and dynamic.
    fn list_definitions(
        &self,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<Vec<AttributeDefinition>, Self::Error>> + Send;
}

/// Source of stored attribute values, used for uniqueness checks.
pub trait AttributeValueStore: Send + Sync {
    /// The error type returned by value lookups.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Attribute ids for which another user already stores the probed value.
    ///
    /// # Arguments
    /// * `probes` - Attribute id and encoded value pairs to look for
    /// * `exclude_user` - User whose own values are ignored (the one being updated)
    fn find_existing(
        &self,
        ctx: &RequestContext,
        probes: &[UniquenessProbe],
        exclude_user: Option<Uuid>,
    ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send;
}

/// Resolves roles and the scopes they grant.
pub trait RoleScopeResolver: Send + Sync {
    /// The error type returned by role lookups.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Roles with the given names. Unknown names are omitted.
    fn resolve_roles_by_name(
        &self,
        ctx: &RequestContext,
        names: &[String],
    ) -> impl Future<Output = Result<Vec<Role>, Self::Error>> + Send;

    /// Roles with the given ids. Unknown ids are omitted.
    fn resolve_roles_by_id(
        &self,
        ctx: &RequestContext,
        ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<Role>, Self::Error>> + Send;
}

/// Resolves accounts.
pub trait AccountResolver: Send + Sync {
    /// The error type returned by account lookups.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Accounts with the given names. Unknown names are omitted.
    fn resolve_accounts_by_name(
        &self,
        ctx: &RequestContext,
        names: &[String],
    ) -> impl Future<Output = Result<Vec<Account>, Self::Error>> + Send;

    /// Accounts with the given ids. Unknown ids are omitted.
    fn resolve_accounts_by_id(
        &self,
        ctx: &RequestContext,
        ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<Account>, Self::Error>> + Send;
}

/// Source of users' current account/role associations.
pub trait PrincipalStore: Send + Sync {
    /// The error type returned by association lookups.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every association the user currently holds.
    fn current_associations(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Vec<AccountRoleAssociation>, Self::Error>> + Send;
}

/// Every collaborator the engine needs, implemented by one directory.
pub trait EntitlementDirectory:
    AttributeSchemaStore + AttributeValueStore + RoleScopeResolver + AccountResolver + PrincipalStore
{
}

impl<T> EntitlementDirectory for T where
    T: AttributeSchemaStore
        + AttributeValueStore
        + RoleScopeResolver
        + AccountResolver
        + PrincipalStore
{
}
