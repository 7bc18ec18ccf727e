//! User-level operations of the entitlement engine.
//!
//! Create and patch are distinct entry points. Each runs attribute
//! validation and association handling independently and reports both
//! outcomes together; the caller persists the result only when both passed.

use crate::association::{
    AccountRoleAssociation, AssociationChangeRequest, AssociationReconciler, Reconciliation,
    ReconciliationResult, ReconciliationSubject, RequestedAssociation,
};
use crate::context::RequestContext;
use crate::directory::EntitlementDirectory;
use crate::engine::EntitlementEngine;
use crate::error::{AssociationRejection, AttributeViolation, EngineError, EngineResult};
use crate::lookup::LookupCache;
use crate::schema::{
    AttributeDefinition, AttributeValidation, AttributeValidationResult, AttributeValidator,
    AttributeValue, RecordState,
};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Request to create a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default = "Uuid::new_v4")]
    pub user_id: Uuid,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub associations: Vec<RequestedAssociation>,
    /// Principal performing the create; no permission check when absent
    #[serde(default)]
    pub acting_user: Option<Uuid>,
}

impl CreateUserRequest {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            attributes,
            associations: Vec::new(),
            acting_user: None,
        }
    }

    pub fn with_association(mut self, account_ref: impl Into<String>, role: impl Into<String>) -> Self {
        self.associations.push(RequestedAssociation::new(account_ref, role));
        self
    }

    pub fn acting_as(mut self, acting_user: Uuid) -> Self {
        self.acting_user = Some(acting_user);
        self
    }
}

/// Request to change an existing user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchUserRequest {
    pub user_id: Uuid,
    pub acting_user: Uuid,
    /// Attribute changes; `null` clears an attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default)]
    pub association_changes: Vec<AssociationChangeRequest>,
}

impl PatchUserRequest {
    pub fn new(user_id: Uuid, acting_user: Uuid) -> Self {
        Self {
            user_id,
            acting_user,
            attributes: None,
            association_changes: Vec::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_change(mut self, change: AssociationChangeRequest) -> Self {
        self.association_changes.push(change);
        self
    }
}

/// Combined outcome of a create or patch.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitlementOutcome {
    pub user_id: Uuid,
    /// Attribute validation, when attributes were part of the request
    pub attributes: Option<AttributeValidation>,
    /// Association handling, when associations were part of the request
    pub associations: Option<Reconciliation>,
}

impl EntitlementOutcome {
    /// Whether every part of the request was accepted.
    pub fn is_ok(&self) -> bool {
        self.attributes.as_ref().is_none_or(AttributeValidation::is_ok)
            && self.associations.as_ref().is_none_or(Reconciliation::is_applied)
    }

    pub fn violations(&self) -> Vec<AttributeViolation> {
        self.attributes
            .as_ref()
            .map(|v| v.result.violations())
            .unwrap_or_default()
    }

    pub fn rejection(&self) -> Option<&AssociationRejection> {
        self.associations.as_ref().and_then(Reconciliation::rejection)
    }

    /// Attribute rows to persist; empty unless the whole outcome is ok.
    pub fn attribute_rows(&self) -> Vec<AttributeValue> {
        match &self.attributes {
            Some(validation) if self.is_ok() => validation.clone().into_rows(self.user_id),
            _ => Vec::new(),
        }
    }

    /// Attribute ids a patch cleared; empty unless the whole outcome is ok.
    pub fn cleared_attributes(&self) -> &[Uuid] {
        match &self.attributes {
            Some(validation) if self.is_ok() => validation.cleared.as_slice(),
            _ => &[],
        }
    }

    /// The association set to persist, when associations changed and the
    /// whole outcome is ok.
    pub fn new_associations(&self) -> Option<&[AccountRoleAssociation]> {
        if !self.is_ok() {
            return None;
        }
        self.associations.as_ref().and_then(Reconciliation::associations)
    }

    /// Serializable form of the outcome.
    pub fn to_result(&self) -> EntitlementResult {
        EntitlementResult {
            ok: self.is_ok(),
            user_id: self.user_id,
            attributes: self.attributes.as_ref().map(|v| v.result.clone()),
            associations: self.associations.as_ref().map(Reconciliation::to_result),
        }
    }
}

/// Combined outcome in its serialized shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementResult {
    pub ok: bool,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associations: Option<ReconciliationResult>,
}

impl<D: EntitlementDirectory> EntitlementEngine<D> {
    /// Validate proposed attributes against the tenant's schema.
    pub async fn validate_attributes(
        &self,
        ctx: &RequestContext,
        proposed: &Map<String, Value>,
        state: RecordState,
    ) -> EngineResult<AttributeValidation> {
        let registry = self.load_registry(ctx).await?;
        AttributeValidator::new(&registry)
            .enforce_read_only(self.config.enforce_read_only)
            .validate(ctx, &self.directory, proposed, state)
            .await
    }

    /// Validate a new user and derive its initial associations.
    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        request: &CreateUserRequest,
    ) -> EngineResult<EntitlementOutcome> {
        info!(
            "Creating user {} (request {}, tenant {})",
            request.user_id, ctx.request_id, ctx.tenant_id
        );

        let attributes = self
            .validate_attributes(ctx, &request.attributes, RecordState::New)
            .await?;

        let requested = if request.associations.is_empty() {
            self.config
                .default_association()
                .map(|(account, role)| vec![RequestedAssociation::new(account, role)])
                .unwrap_or_default()
        } else {
            request.associations.clone()
        };

        let mut cache = LookupCache::new();
        let associations = AssociationReconciler::new(&self.evaluator)
            .initial(
                ctx,
                &self.directory,
                &mut cache,
                request.user_id,
                request.acting_user,
                &requested,
            )
            .await?;

        let outcome = EntitlementOutcome {
            user_id: request.user_id,
            attributes: Some(attributes),
            associations: Some(associations),
        };
        log_outcome("Create", ctx, &outcome);
        Ok(outcome)
    }

    /// Validate attribute changes and reconcile association changes of an
    /// existing user.
    pub async fn patch_user(
        &self,
        ctx: &RequestContext,
        request: &PatchUserRequest,
    ) -> EngineResult<EntitlementOutcome> {
        info!(
            "Patching user {} by {} (request {}, tenant {})",
            request.user_id, request.acting_user, ctx.request_id, ctx.tenant_id
        );

        let attributes = match &request.attributes {
            Some(proposed) => Some(
                self.validate_attributes(ctx, proposed, RecordState::Existing(request.user_id))
                    .await?,
            ),
            None => None,
        };

        let associations = if request.association_changes.is_empty() {
            None
        } else {
            Some(
                self.associate(
                    ctx,
                    request.user_id,
                    request.acting_user,
                    &request.association_changes,
                )
                .await?,
            )
        };

        let outcome = EntitlementOutcome {
            user_id: request.user_id,
            attributes,
            associations,
        };
        log_outcome("Patch", ctx, &outcome);
        Ok(outcome)
    }

    /// Reconcile a change batch against the user's stored associations.
    pub async fn associate(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        acting_user: Uuid,
        changes: &[AssociationChangeRequest],
    ) -> EngineResult<Reconciliation> {
        let current = self
            .directory
            .current_associations(ctx, user_id)
            .await
            .map_err(|e| EngineError::collaborator("principals.current_associations", [user_id], e))?;
        self.reconcile(ctx, user_id, acting_user, &current, changes)
            .await
    }

    /// Reconcile a change batch against associations the caller supplies.
    pub async fn reconcile(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        acting_user: Uuid,
        current: &[AccountRoleAssociation],
        changes: &[AssociationChangeRequest],
    ) -> EngineResult<Reconciliation> {
        let mut cache = LookupCache::new();
        AssociationReconciler::new(&self.evaluator)
            .reconcile(
                ctx,
                &self.directory,
                &mut cache,
                ReconciliationSubject::new(user_id, acting_user, current),
                changes,
            )
            .await
    }

    /// Add or replace a dynamic attribute definition.
    ///
    /// Returns the tenant's complete new definition set for persistence.
    pub async fn define_attribute(
        &self,
        ctx: &RequestContext,
        definition: AttributeDefinition,
    ) -> EngineResult<Vec<AttributeDefinition>> {
        let mut registry = self.load_registry(ctx).await?;
        let name = registry.define(definition)?.name.clone();
        info!("Defined attribute '{}' for tenant {}", name, ctx.tenant_id);
        Ok(registry.into_definitions())
    }

    /// Retire a dynamic attribute definition.
    ///
    /// Returns the retired definition and the remaining definition set.
    pub async fn retire_attribute(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> EngineResult<(AttributeDefinition, Vec<AttributeDefinition>)> {
        let mut registry = self.load_registry(ctx).await?;
        let retired = registry.retire(name)?;
        info!("Retired attribute '{}' for tenant {}", retired.name, ctx.tenant_id);
        Ok((retired, registry.into_definitions()))
    }
}

fn log_outcome(operation: &str, ctx: &RequestContext, outcome: &EntitlementOutcome) {
    if outcome.is_ok() {
        info!(
            "{} of user {} accepted (request {})",
            operation, outcome.user_id, ctx.request_id
        );
    } else {
        warn!(
            "{} of user {} rejected (request {}): violations {:?}, rejection {:?}",
            operation,
            outcome.user_id,
            ctx.request_id,
            outcome.violations(),
            outcome.rejection()
        );
    }
}
