//! Permission evaluation for role grants and revocations.
//!
//! A principal may modify a set of target roles when
//!
//! - it holds exactly the target roles itself (self-modification), or
//! - its scopes include the system scope, or
//! - its scopes are a superset of the scopes the target roles grant.
//!
//! The comparison is over flattened scope sets at the time of the check.
//! There is no role hierarchy: two roles granting the same scopes are
//! interchangeable.

use super::Principal;
use crate::association::AccountRoleAssociation;
use crate::context::RequestContext;
use crate::directory::{PrincipalStore, RoleScopeResolver};
use crate::error::{EngineError, EngineResult};
use crate::lookup::LookupCache;

use log::{debug, warn};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Why a modification was permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitReason {
    /// The principal holds exactly the target roles
    SelfModification,
    /// The principal holds the system scope
    SystemScope,
    /// The principal's scopes cover the target scopes
    ScopeSuperset,
}

/// Outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    Permitted(PermitReason),
    /// Scopes the target roles grant that the principal lacks
    Denied { missing_scopes: BTreeSet<String> },
}

impl PermissionDecision {
    pub fn is_permitted(&self) -> bool {
        matches!(self, PermissionDecision::Permitted(_))
    }
}

/// Decides whether a principal may grant or revoke a set of roles.
#[derive(Debug, Clone)]
pub struct PermissionEvaluator {
    system_scope: String,
    allow_self_modification: bool,
}

impl PermissionEvaluator {
    /// Create an evaluator that treats `system_scope` as unrestricted.
    pub fn new(system_scope: impl Into<String>) -> Self {
        Self {
            system_scope: system_scope.into(),
            allow_self_modification: true,
        }
    }

    /// Enable or disable the self-modification shortcut.
    pub fn with_self_modification(mut self, allowed: bool) -> Self {
        self.allow_self_modification = allowed;
        self
    }

    /// Check whether `acting_user` may modify `target_roles`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnresolvedRole`] when a role the principal holds
    /// or a target role does not resolve. This is never reported as a denial.
    pub async fn is_permitted<D>(
        &self,
        ctx: &RequestContext,
        directory: &D,
        cache: &mut LookupCache,
        acting_user: Uuid,
        target_roles: &BTreeSet<String>,
    ) -> EngineResult<PermissionDecision>
    where
        D: RoleScopeResolver + PrincipalStore,
    {
        let associations = directory
            .current_associations(ctx, acting_user)
            .await
            .map_err(|e| {
                EngineError::collaborator("principals.current_associations", [acting_user], e)
            })?;
        self.evaluate(ctx, directory, cache, acting_user, &associations, target_roles)
            .await
    }

    /// Check a principal whose associations the caller already holds.
    pub async fn evaluate<R>(
        &self,
        ctx: &RequestContext,
        resolver: &R,
        cache: &mut LookupCache,
        acting_user: Uuid,
        associations: &[AccountRoleAssociation],
        target_roles: &BTreeSet<String>,
    ) -> EngineResult<PermissionDecision>
    where
        R: RoleScopeResolver,
    {
        let role_ids: BTreeSet<Uuid> = associations.iter().map(|a| a.role_id).collect();
        cache
            .load_roles_by_id(ctx, resolver, role_ids.iter().copied())
            .await?;

        let unresolved_ids: Vec<String> = role_ids
            .iter()
            .filter(|id| cache.role(id).is_none())
            .map(|id| id.to_string())
            .collect();
        if !unresolved_ids.is_empty() {
            warn!(
                "Principal {} holds roles that no longer resolve: {:?}",
                acting_user, unresolved_ids
            );
            return Err(EngineError::UnresolvedRole {
                principal: acting_user,
                roles: unresolved_ids,
            });
        }

        let held_roles: BTreeSet<String> = role_ids
            .iter()
            .filter_map(|id| cache.role(id))
            .map(|role| role.name.clone())
            .collect();

        if self.allow_self_modification && held_roles == *target_roles {
            debug!("Principal {} modifies its own role set", acting_user);
            return Ok(PermissionDecision::Permitted(PermitReason::SelfModification));
        }

        let union: Vec<String> = held_roles.union(target_roles).cloned().collect();
        cache
            .load_roles_by_name(ctx, resolver, union.iter().map(String::as_str))
            .await?;

        let unresolved: Vec<String> = union
            .iter()
            .filter(|name| cache.role_by_name(name).is_none())
            .cloned()
            .collect();
        if !unresolved.is_empty() {
            warn!(
                "Roles {:?} do not resolve while checking principal {}",
                unresolved, acting_user
            );
            return Err(EngineError::UnresolvedRole {
                principal: acting_user,
                roles: unresolved,
            });
        }

        let principal = Principal {
            user_id: acting_user,
            scopes: scopes_of(cache, &held_roles),
            roles: held_roles,
        };
        Ok(self.decide(&principal, &scopes_of(cache, target_roles)))
    }

    /// Compare a resolved principal against the scopes of the target roles.
    pub fn decide(
        &self,
        principal: &Principal,
        target_scopes: &BTreeSet<String>,
    ) -> PermissionDecision {
        if principal.scopes.contains(&self.system_scope) {
            debug!("Principal {} holds the system scope", principal.user_id);
            return PermissionDecision::Permitted(PermitReason::SystemScope);
        }

        let missing_scopes: BTreeSet<String> = target_scopes
            .difference(&principal.scopes)
            .cloned()
            .collect();
        if missing_scopes.is_empty() {
            PermissionDecision::Permitted(PermitReason::ScopeSuperset)
        } else {
            debug!(
                "Principal {} lacks scopes {:?}",
                principal.user_id, missing_scopes
            );
            PermissionDecision::Denied { missing_scopes }
        }
    }
}

fn scopes_of(cache: &LookupCache, roles: &BTreeSet<String>) -> BTreeSet<String> {
    roles
        .iter()
        .filter_map(|name| cache.role_by_name(name))
        .flat_map(|role| role.scopes.iter().cloned())
        .collect()
}
