//! Reconciliation of association change batches.
//!
//! A batch is applied all-or-nothing. Every reference is resolved first,
//! every request is classified against the state before the batch, and only
//! when nothing failed is the new set computed:
//!
//! ```text
//! resolve refs -> sort by priority -> classify -> guard -> permission -> apply
//! ```
//!
//! The reconciler reads through collaborators but never writes; the new set
//! is returned for the caller to persist.

use super::types::{
    AccountRoleAssociation, AssociationChangeRequest, AssociationPair, AssociationTarget,
    ChangeErrorReason, ChangeOperation, ChangeRequestError, RequestedAssociation,
};
use crate::access::PermissionEvaluator;
use crate::context::RequestContext;
use crate::directory::{AccountResolver, PrincipalStore, RoleScopeResolver};
use crate::error::{AssociationRejection, EngineError, EngineResult, RejectionKind};
use crate::lookup::{self, LookupCache};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

/// Accepted outcome of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationChanges {
    /// The complete new association set
    pub associations: Vec<AccountRoleAssociation>,
    pub added: Vec<AccountRoleAssociation>,
    pub removed: Vec<AccountRoleAssociation>,
}

/// The user a batch applies to, the principal applying it and the
/// associations the user holds before it.
#[derive(Debug, Clone, Copy)]
pub struct ReconciliationSubject<'a> {
    pub user_id: Uuid,
    pub acting_user: Uuid,
    pub current: &'a [AccountRoleAssociation],
}

impl<'a> ReconciliationSubject<'a> {
    pub fn new(user_id: Uuid, acting_user: Uuid, current: &'a [AccountRoleAssociation]) -> Self {
        Self {
            user_id,
            acting_user,
            current,
        }
    }
}

/// Result of reconciling a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Applied(AssociationChanges),
    Rejected {
        rejection: AssociationRejection,
        /// Per-request details of the rejection
        errors: Vec<ChangeRequestError>,
    },
}

impl Reconciliation {
    fn rejected(rejection: AssociationRejection, errors: Vec<ChangeRequestError>) -> Self {
        Reconciliation::Rejected { rejection, errors }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Reconciliation::Applied(_))
    }

    pub fn rejection(&self) -> Option<&AssociationRejection> {
        match self {
            Reconciliation::Applied(_) => None,
            Reconciliation::Rejected { rejection, .. } => Some(rejection),
        }
    }

    /// The new association set, if the batch was applied.
    pub fn associations(&self) -> Option<&[AccountRoleAssociation]> {
        match self {
            Reconciliation::Applied(changes) => Some(&changes.associations),
            Reconciliation::Rejected { .. } => None,
        }
    }

    /// Serializable form of the outcome.
    pub fn to_result(&self) -> ReconciliationResult {
        match self {
            Reconciliation::Applied(changes) => ReconciliationResult {
                ok: true,
                new_associations: changes.associations.iter().map(|a| a.pair()).collect(),
                errors: Vec::new(),
                rejection: None,
            },
            Reconciliation::Rejected { rejection, errors } => ReconciliationResult {
                ok: false,
                new_associations: Vec::new(),
                errors: errors.clone(),
                rejection: Some(rejection.kind()),
            },
        }
    }
}

/// Reconciliation outcome in its serialized shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub ok: bool,
    pub new_associations: Vec<AssociationPair>,
    pub errors: Vec<ChangeRequestError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionKind>,
}

/// A change request whose references all resolved.
#[derive(Debug, Clone)]
struct ResolvedRequest<'r> {
    request: &'r AssociationChangeRequest,
    account_id: Uuid,
    /// Role id and name, for requests naming a role
    role: Option<(Uuid, String)>,
}

/// Account reference as supplied by a caller.
enum AccountRef<'a> {
    Id(Uuid),
    Name(&'a str),
}

impl<'a> AccountRef<'a> {
    fn parse(raw: &'a str) -> Self {
        match Uuid::parse_str(raw) {
            Ok(id) => AccountRef::Id(id),
            Err(_) => AccountRef::Name(raw),
        }
    }

    fn resolve(&self, cache: &LookupCache) -> Option<Uuid> {
        match self {
            AccountRef::Id(id) => cache.account(id).map(|a| a.id),
            AccountRef::Name(name) => cache.account_by_name(name).map(|a| a.id),
        }
    }
}

/// Computes new association sets from change batches.
#[derive(Debug, Clone)]
pub struct AssociationReconciler<'e> {
    evaluator: &'e PermissionEvaluator,
}

impl<'e> AssociationReconciler<'e> {
    pub fn new(evaluator: &'e PermissionEvaluator) -> Self {
        Self { evaluator }
    }

    /// Reconcile `requests` against the user's `current` associations.
    ///
    /// # Errors
    ///
    /// Collaborator failures and unresolvable roles are returned as `Err`;
    /// every other failure is a [`Reconciliation::Rejected`] verdict.
    pub async fn reconcile<D>(
        &self,
        ctx: &RequestContext,
        directory: &D,
        cache: &mut LookupCache,
        subject: ReconciliationSubject<'_>,
        requests: &[AssociationChangeRequest],
    ) -> EngineResult<Reconciliation>
    where
        D: RoleScopeResolver + AccountResolver + PrincipalStore,
    {
        let ReconciliationSubject {
            user_id,
            acting_user,
            current,
        } = subject;
        let current = dedup_preserving_order(current);
        if requests.is_empty() {
            debug!("Empty change batch for user {}", user_id);
            return Ok(Reconciliation::Applied(AssociationChanges {
                associations: current,
                added: Vec::new(),
                removed: Vec::new(),
            }));
        }

        info!(
            "Reconciling {} change requests for user {} (request {}, tenant {})",
            requests.len(),
            user_id,
            ctx.request_id,
            ctx.tenant_id
        );

        // 1. Resolve every reference before looking at any operation
        let current_role_ids: Vec<Uuid> = current.iter().map(|a| a.role_id).collect();
        resolve_references(ctx, directory, cache, requests, &current_role_ids).await?;

        let mut resolved = Vec::with_capacity(requests.len());
        let mut reference_errors = Vec::new();
        for request in requests {
            match resolve_request(cache, request) {
                Ok(r) => resolved.push(r),
                Err(errors) => reference_errors.extend(errors),
            }
        }
        if !reference_errors.is_empty() {
            warn!(
                "Rejecting batch for user {}: {} unresolved references",
                user_id,
                reference_errors.len()
            );
            return Ok(Reconciliation::rejected(
                AssociationRejection::InvalidAssociationReference {
                    errors: reference_errors.clone(),
                },
                reference_errors,
            ));
        }

        // 2. Stable sort: specific removals, account removals, additions
        resolved.sort_by_key(|r| r.request.op);

        // 3. Classify against the state before the batch
        let index = AssociationIndex::new(&current);
        let mut removals: BTreeSet<AssociationPair> = BTreeSet::new();
        let mut additions: Vec<AssociationPair> = Vec::new();
        let mut touched_roles: BTreeSet<String> = BTreeSet::new();
        let mut operation_errors = Vec::new();

        for r in &resolved {
            match (r.request.op, &r.role) {
                (ChangeOperation::RemoveSpecific, Some((role_id, role_name))) => {
                    if index.contains(r.account_id, *role_id) {
                        removals.insert(AssociationPair {
                            account_id: r.account_id,
                            role_id: *role_id,
                        });
                        touched_roles.insert(role_name.clone());
                    } else {
                        operation_errors.push(r.request.error(ChangeErrorReason::AssociationMissing));
                    }
                }
                (ChangeOperation::RemoveAllForAccount, None) => {
                    let roles = index.roles_of(r.account_id);
                    if roles.is_empty() {
                        operation_errors
                            .push(r.request.error(ChangeErrorReason::AccountHasNoAssociations));
                        continue;
                    }
                    for role_id in roles {
                        let role = cache.role(&role_id).ok_or_else(|| {
                            warn!(
                                "User {} holds role {} which no longer resolves",
                                user_id, role_id
                            );
                            EngineError::UnresolvedRole {
                                principal: user_id,
                                roles: vec![role_id.to_string()],
                            }
                        })?;
                        touched_roles.insert(role.name.clone());
                        removals.insert(AssociationPair {
                            account_id: r.account_id,
                            role_id,
                        });
                    }
                }
                (ChangeOperation::Add, Some((role_id, role_name))) => {
                    let pair = AssociationPair {
                        account_id: r.account_id,
                        role_id: *role_id,
                    };
                    if index.contains(r.account_id, *role_id) {
                        operation_errors.push(r.request.error(ChangeErrorReason::AssociationExists));
                    } else if !additions.contains(&pair) {
                        additions.push(pair);
                        touched_roles.insert(role_name.clone());
                    }
                }
                (ChangeOperation::RemoveSpecific | ChangeOperation::Add, None) => {
                    operation_errors.push(r.request.error(ChangeErrorReason::RoleTargetRequired));
                }
                (ChangeOperation::RemoveAllForAccount, Some(_)) => {
                    operation_errors
                        .push(r.request.error(ChangeErrorReason::AllRolesTargetRequired));
                }
            }
        }

        if !operation_errors.is_empty() {
            warn!(
                "Rejecting batch for user {}: {} invalid operations",
                user_id,
                operation_errors.len()
            );
            return Ok(Reconciliation::rejected(
                AssociationRejection::InvalidAssociationOperation {
                    errors: operation_errors.clone(),
                },
                operation_errors,
            ));
        }

        // 4. A user is never left without an association
        let removes_everything = !current.is_empty()
            && current.iter().all(|a| removals.contains(&a.pair()));
        if removes_everything && additions.is_empty() {
            warn!("Rejecting batch for user {}: would remove every association", user_id);
            let errors = resolved
                .iter()
                .filter(|r| r.request.op != ChangeOperation::Add)
                .map(|r| r.request.error(ChangeErrorReason::WouldRemoveAllAssociations))
                .collect();
            return Ok(Reconciliation::rejected(
                AssociationRejection::CannotFullyDisassociate { user_id },
                errors,
            ));
        }

        // 5. The acting principal must be allowed to touch every role
        if !touched_roles.is_empty() {
            let decision = self
                .evaluator
                .is_permitted(ctx, directory, cache, acting_user, &touched_roles)
                .await?;
            if !decision.is_permitted() {
                warn!(
                    "Principal {} may not modify roles {:?} of user {}",
                    acting_user, touched_roles, user_id
                );
                let errors = resolved
                    .iter()
                    .map(|r| r.request.error(ChangeErrorReason::PermissionDenied))
                    .collect();
                return Ok(Reconciliation::rejected(
                    AssociationRejection::PermissionDenied {
                        acting_user,
                        roles: touched_roles.into_iter().collect(),
                    },
                    errors,
                ));
            }
        }

        // 6. (current - removals) + additions
        let (kept, removed): (Vec<_>, Vec<_>) = current
            .into_iter()
            .partition(|a| !removals.contains(&a.pair()));
        let added: Vec<AccountRoleAssociation> = additions
            .into_iter()
            .map(|p| AccountRoleAssociation::new(user_id, p.account_id, p.role_id))
            .collect();
        let mut associations = kept;
        associations.extend(added.iter().copied());

        info!(
            "Reconciled associations for user {}: {} removed, {} added, {} total",
            user_id,
            removed.len(),
            added.len(),
            associations.len()
        );
        Ok(Reconciliation::Applied(AssociationChanges {
            associations,
            added,
            removed,
        }))
    }

    /// Derive the association set of a user being created.
    ///
    /// There is no current state to reconcile against: the requested pairs
    /// are resolved, deduplicated and, when an acting principal is given,
    /// checked for permission.
    pub async fn initial<D>(
        &self,
        ctx: &RequestContext,
        directory: &D,
        cache: &mut LookupCache,
        user_id: Uuid,
        acting_user: Option<Uuid>,
        requested: &[RequestedAssociation],
    ) -> EngineResult<Reconciliation>
    where
        D: RoleScopeResolver + AccountResolver + PrincipalStore,
    {
        let changes: Vec<AssociationChangeRequest> =
            requested.iter().map(RequestedAssociation::as_change).collect();
        resolve_references(ctx, directory, cache, &changes, &[]).await?;

        let mut associations = Vec::new();
        let mut seen = HashSet::new();
        let mut roles = BTreeSet::new();
        let mut reference_errors = Vec::new();
        for change in &changes {
            match resolve_request(cache, change) {
                Ok(ResolvedRequest {
                    account_id,
                    role: Some((role_id, role_name)),
                    ..
                }) => {
                    roles.insert(role_name);
                    if seen.insert((account_id, role_id)) {
                        associations.push(AccountRoleAssociation::new(user_id, account_id, role_id));
                    }
                }
                Ok(_) => reference_errors.push(change.error(ChangeErrorReason::RoleTargetRequired)),
                Err(errors) => reference_errors.extend(errors),
            }
        }

        if !reference_errors.is_empty() {
            return Ok(Reconciliation::rejected(
                AssociationRejection::InvalidAssociationReference {
                    errors: reference_errors.clone(),
                },
                reference_errors,
            ));
        }
        if associations.is_empty() {
            return Ok(Reconciliation::rejected(
                AssociationRejection::CannotFullyDisassociate { user_id },
                Vec::new(),
            ));
        }

        if let Some(acting_user) = acting_user {
            let decision = self
                .evaluator
                .is_permitted(ctx, directory, cache, acting_user, &roles)
                .await?;
            if !decision.is_permitted() {
                let errors = changes
                    .iter()
                    .map(|c| c.error(ChangeErrorReason::PermissionDenied))
                    .collect();
                return Ok(Reconciliation::rejected(
                    AssociationRejection::PermissionDenied {
                        acting_user,
                        roles: roles.into_iter().collect(),
                    },
                    errors,
                ));
            }
        }

        debug!(
            "Derived {} initial associations for user {}",
            associations.len(),
            user_id
        );
        Ok(Reconciliation::Applied(AssociationChanges {
            added: associations.clone(),
            associations,
            removed: Vec::new(),
        }))
    }
}

/// Account -> role ids held on it.
struct AssociationIndex {
    by_account: BTreeMap<Uuid, BTreeSet<Uuid>>,
}

impl AssociationIndex {
    fn new(current: &[AccountRoleAssociation]) -> Self {
        let mut by_account: BTreeMap<Uuid, BTreeSet<Uuid>> = BTreeMap::new();
        for association in current {
            by_account
                .entry(association.account_id)
                .or_default()
                .insert(association.role_id);
        }
        Self { by_account }
    }

    fn contains(&self, account_id: Uuid, role_id: Uuid) -> bool {
        self.by_account
            .get(&account_id)
            .is_some_and(|roles| roles.contains(&role_id))
    }

    fn roles_of(&self, account_id: Uuid) -> Vec<Uuid> {
        self.by_account
            .get(&account_id)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default()
    }
}

fn dedup_preserving_order(current: &[AccountRoleAssociation]) -> Vec<AccountRoleAssociation> {
    let mut seen = HashSet::new();
    current
        .iter()
        .filter(|a| seen.insert(a.pair()))
        .copied()
        .collect()
}

/// Resolve every account and role the batch and the current set refer to.
///
/// Lookups that are independent of each other run concurrently.
async fn resolve_references<D>(
    ctx: &RequestContext,
    directory: &D,
    cache: &mut LookupCache,
    requests: &[AssociationChangeRequest],
    current_role_ids: &[Uuid],
) -> EngineResult<()>
where
    D: RoleScopeResolver + AccountResolver,
{
    let mut account_ids = Vec::new();
    let mut account_names = Vec::new();
    for request in requests {
        match AccountRef::parse(&request.account_ref) {
            AccountRef::Id(id) => account_ids.push(id),
            AccountRef::Name(name) => account_names.push(name),
        }
    }

    let account_ids = cache.unseen_account_ids(account_ids);
    let account_names = cache.unseen_account_names(account_names);
    let role_names =
        cache.unseen_role_names(requests.iter().filter_map(|r| r.target.role_name()));
    let role_ids = cache.unseen_role_ids(current_role_ids.iter().copied());

    let (by_account_id, by_account_name, by_role_name, by_role_id) = tokio::try_join!(
        lookup::fetch_accounts_by_id(ctx, directory, &account_ids),
        lookup::fetch_accounts_by_name(ctx, directory, &account_names),
        lookup::fetch_roles_by_name(ctx, directory, &role_names),
        lookup::fetch_roles_by_id(ctx, directory, &role_ids),
    )?;

    cache.record_accounts_by_id(&account_ids, by_account_id);
    cache.record_accounts_by_name(&account_names, by_account_name);
    cache.record_roles_by_name(&role_names, by_role_name);
    cache.record_roles_by_id(&role_ids, by_role_id);
    Ok(())
}

fn resolve_request<'r>(
    cache: &LookupCache,
    request: &'r AssociationChangeRequest,
) -> Result<ResolvedRequest<'r>, Vec<ChangeRequestError>> {
    let mut errors = Vec::new();

    let account_id = AccountRef::parse(&request.account_ref).resolve(cache);
    if account_id.is_none() {
        errors.push(request.error(ChangeErrorReason::UnknownAccount));
    }

    let role = match &request.target {
        AssociationTarget::Role(name) => match cache.role_by_name(name) {
            Some(role) => Some((role.id, role.name.clone())),
            None => {
                errors.push(request.error(ChangeErrorReason::UnknownRole));
                None
            }
        },
        AssociationTarget::AllRoles => None,
    };

    match account_id {
        Some(account_id) if errors.is_empty() => Ok(ResolvedRequest {
            request,
            account_id,
            role,
        }),
        _ => Err(errors),
    }
}
