//! In-memory directory implementing every collaborator trait.
//!
//! Data is partitioned by tenant: each [`RequestContext`] only sees the
//! definitions, values, roles, accounts and associations seeded under its
//! tenant id.
//!
//! Every trait call is counted, and any call can be made to fail, so tests
//! can assert how often the engine reaches its collaborators and how it
//! reacts when one of them is down.
//!
//! # Example Usage
//!
//! ```rust
//! use entitlement_engine::access::{Account, Role};
//! use entitlement_engine::directory::{DirectoryCall, InMemoryDirectory};
//! use entitlement_engine::RequestContext;
//!
//! # async fn example() {
//! let directory = InMemoryDirectory::new();
//! let admin = Role::new("admin", ["users:write"]);
//! let account = Account::new("acme");
//! directory.add_role("tenant-a", admin.clone()).await;
//! directory.add_account("tenant-a", account.clone()).await;
//!
//! let user_id = uuid::Uuid::new_v4();
//! directory.associate("tenant-a", user_id, account.id, admin.id).await;
//! assert_eq!(directory.associations_of("tenant-a", user_id).await.len(), 1);
//! assert_eq!(directory.call_count(DirectoryCall::RolesByName).await, 0);
//! # }
//! ```

use super::{
    AccountResolver, AttributeSchemaStore, AttributeValueStore, PrincipalStore,
    RoleScopeResolver, UniquenessProbe,
};
use crate::access::{Account, Role};
use crate::association::AccountRoleAssociation;
use crate::context::RequestContext;
use crate::schema::{AttributeDefinition, AttributeValue, user_field_definitions};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Collaborator calls the directory answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectoryCall {
    ListDefinitions,
    FindExisting,
    RolesByName,
    RolesById,
    AccountsByName,
    AccountsById,
    CurrentAssociations,
}

impl fmt::Display for DirectoryCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectoryCall::ListDefinitions => "list_definitions",
            DirectoryCall::FindExisting => "find_existing",
            DirectoryCall::RolesByName => "resolve_roles_by_name",
            DirectoryCall::RolesById => "resolve_roles_by_id",
            DirectoryCall::AccountsByName => "resolve_accounts_by_name",
            DirectoryCall::AccountsById => "resolve_accounts_by_id",
            DirectoryCall::CurrentAssociations => "current_associations",
        };
        f.write_str(name)
    }
}

/// Errors raised by [`InMemoryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InMemoryDirectoryError {
    /// The call was configured to fail with [`InMemoryDirectory::fail`].
    #[error("Directory call '{call}' is unavailable for tenant '{tenant_id}'")]
    Unavailable {
        call: DirectoryCall,
        tenant_id: String,
    },
}

/// Everything stored for one tenant.
#[derive(Debug, Default)]
struct TenantDirectory {
    // case-folded name -> definition
    definitions: BTreeMap<String, AttributeDefinition>,
    // user id -> attribute id -> encoded value
    values: HashMap<Uuid, HashMap<Uuid, String>>,
    roles: HashMap<Uuid, Role>,
    accounts: HashMap<Uuid, Account>,
    associations: HashMap<Uuid, Vec<AccountRoleAssociation>>,
}

/// Thread-safe in-memory directory.
#[derive(Clone)]
pub struct InMemoryDirectory {
    // Structure: tenant_id -> tenant data
    data: Arc<RwLock<HashMap<String, TenantDirectory>>>,
    calls: Arc<RwLock<HashMap<DirectoryCall, usize>>>,
    failing: Arc<RwLock<HashSet<DirectoryCall>>>,
}

impl InMemoryDirectory {
    /// Create a new empty directory.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(HashMap::new())),
            failing: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Seed the built-in user fields for a tenant.
    pub async fn with_builtin_fields(self, tenant_id: &str) -> Self {
        for definition in user_field_definitions() {
            self.add_definition(tenant_id, definition).await;
        }
        self
    }

    pub async fn add_definition(&self, tenant_id: &str, definition: AttributeDefinition) {
        let mut data = self.data.write().await;
        data.entry(tenant_id.to_string())
            .or_default()
            .definitions
            .insert(definition.key(), definition);
    }

    /// Remove a definition by name. Returns whether it existed.
    pub async fn remove_definition(&self, tenant_id: &str, name: &str) -> bool {
        let mut data = self.data.write().await;
        data.get_mut(tenant_id)
            .map(|tenant| tenant.definitions.remove(&name.to_lowercase()).is_some())
            .unwrap_or(false)
    }

    pub async fn add_role(&self, tenant_id: &str, role: Role) {
        let mut data = self.data.write().await;
        data.entry(tenant_id.to_string())
            .or_default()
            .roles
            .insert(role.id, role);
    }

    /// Delete a role while leaving associations that point at it in place.
    pub async fn remove_role(&self, tenant_id: &str, role_id: Uuid) -> bool {
        let mut data = self.data.write().await;
        data.get_mut(tenant_id)
            .map(|tenant| tenant.roles.remove(&role_id).is_some())
            .unwrap_or(false)
    }

    pub async fn add_account(&self, tenant_id: &str, account: Account) {
        let mut data = self.data.write().await;
        data.entry(tenant_id.to_string())
            .or_default()
            .accounts
            .insert(account.id, account);
    }

    /// Grant `role_id` on `account_id` to a user.
    pub async fn associate(&self, tenant_id: &str, user_id: Uuid, account_id: Uuid, role_id: Uuid) {
        let association = AccountRoleAssociation::new(user_id, account_id, role_id);
        let mut data = self.data.write().await;
        let held = data
            .entry(tenant_id.to_string())
            .or_default()
            .associations
            .entry(user_id)
            .or_default();
        if !held.contains(&association) {
            held.push(association);
        }
    }

    /// Replace a user's associations with a reconciled set.
    pub async fn replace_associations(
        &self,
        tenant_id: &str,
        user_id: Uuid,
        associations: Vec<AccountRoleAssociation>,
    ) {
        let mut data = self.data.write().await;
        data.entry(tenant_id.to_string())
            .or_default()
            .associations
            .insert(user_id, associations);
    }

    pub async fn associations_of(&self, tenant_id: &str, user_id: Uuid) -> Vec<AccountRoleAssociation> {
        let data = self.data.read().await;
        data.get(tenant_id)
            .and_then(|tenant| tenant.associations.get(&user_id))
            .cloned()
            .unwrap_or_default()
    }

    /// Persist accepted attribute rows and drop cleared attributes.
    pub async fn store_values(&self, tenant_id: &str, rows: Vec<AttributeValue>, cleared: &[(Uuid, Uuid)]) {
        let mut data = self.data.write().await;
        let tenant = data.entry(tenant_id.to_string()).or_default();
        for row in rows {
            tenant
                .values
                .entry(row.user_id)
                .or_default()
                .insert(row.attribute_id, row.value);
        }
        for (user_id, attribute_id) in cleared {
            if let Some(values) = tenant.values.get_mut(user_id) {
                values.remove(attribute_id);
            }
        }
    }

    /// Stored encoded value of one attribute of a user.
    pub async fn value_of(&self, tenant_id: &str, user_id: Uuid, attribute_id: Uuid) -> Option<String> {
        let data = self.data.read().await;
        data.get(tenant_id)
            .and_then(|tenant| tenant.values.get(&user_id))
            .and_then(|values| values.get(&attribute_id))
            .cloned()
    }

    /// Make every subsequent `call` fail until [`recover`](Self::recover).
    pub async fn fail(&self, call: DirectoryCall) {
        self.failing.write().await.insert(call);
    }

    pub async fn recover(&self, call: DirectoryCall) {
        self.failing.write().await.remove(&call);
    }

    /// Number of times `call` was made.
    pub async fn call_count(&self, call: DirectoryCall) -> usize {
        self.calls.read().await.get(&call).copied().unwrap_or(0)
    }

    /// Total number of collaborator calls made.
    pub async fn total_calls(&self) -> usize {
        self.calls.read().await.values().sum()
    }

    pub async fn reset_call_counts(&self) {
        self.calls.write().await.clear();
    }

    /// Clear all data (useful for testing).
    pub async fn clear(&self) {
        self.data.write().await.clear();
        self.calls.write().await.clear();
        self.failing.write().await.clear();
    }

    async fn record_call(
        &self,
        ctx: &RequestContext,
        call: DirectoryCall,
    ) -> Result<(), InMemoryDirectoryError> {
        *self.calls.write().await.entry(call).or_insert(0) += 1;
        if self.failing.read().await.contains(&call) {
            return Err(InMemoryDirectoryError::Unavailable {
                call,
                tenant_id: ctx.tenant_id().to_string(),
            });
        }
        Ok(())
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeSchemaStore for InMemoryDirectory {
    type Error = InMemoryDirectoryError;

    async fn list_definitions(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<AttributeDefinition>, Self::Error> {
        self.record_call(ctx, DirectoryCall::ListDefinitions).await?;
        let data = self.data.read().await;
        Ok(data
            .get(ctx.tenant_id())
            .map(|tenant| tenant.definitions.values().cloned().collect())
            .unwrap_or_default())
    }
}

impl AttributeValueStore for InMemoryDirectory {
    type Error = InMemoryDirectoryError;

    async fn find_existing(
        &self,
        ctx: &RequestContext,
        probes: &[UniquenessProbe],
        exclude_user: Option<Uuid>,
    ) -> Result<HashSet<Uuid>, Self::Error> {
        self.record_call(ctx, DirectoryCall::FindExisting).await?;
        let data = self.data.read().await;
        let Some(tenant) = data.get(ctx.tenant_id()) else {
            return Ok(HashSet::new());
        };

        let taken = probes
            .iter()
            .filter(|probe| {
                tenant
                    .values
                    .iter()
                    .filter(|(user_id, _)| Some(**user_id) != exclude_user)
                    .any(|(_, values)| {
                        values
                            .get(&probe.attribute_id)
                            .is_some_and(|stored| *stored == probe.encoded)
                    })
            })
            .map(|probe| probe.attribute_id)
            .collect();
        Ok(taken)
    }
}

impl RoleScopeResolver for InMemoryDirectory {
    type Error = InMemoryDirectoryError;

    async fn resolve_roles_by_name(
        &self,
        ctx: &RequestContext,
        names: &[String],
    ) -> Result<Vec<Role>, Self::Error> {
        self.record_call(ctx, DirectoryCall::RolesByName).await?;
        let data = self.data.read().await;
        Ok(data
            .get(ctx.tenant_id())
            .map(|tenant| {
                tenant
                    .roles
                    .values()
                    .filter(|role| names.contains(&role.name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn resolve_roles_by_id(
        &self,
        ctx: &RequestContext,
        ids: &[Uuid],
    ) -> Result<Vec<Role>, Self::Error> {
        self.record_call(ctx, DirectoryCall::RolesById).await?;
        let data = self.data.read().await;
        Ok(data
            .get(ctx.tenant_id())
            .map(|tenant| ids.iter().filter_map(|id| tenant.roles.get(id)).cloned().collect())
            .unwrap_or_default())
    }
}

impl AccountResolver for InMemoryDirectory {
    type Error = InMemoryDirectoryError;

    async fn resolve_accounts_by_name(
        &self,
        ctx: &RequestContext,
        names: &[String],
    ) -> Result<Vec<Account>, Self::Error> {
        self.record_call(ctx, DirectoryCall::AccountsByName).await?;
        let data = self.data.read().await;
        Ok(data
            .get(ctx.tenant_id())
            .map(|tenant| {
                tenant
                    .accounts
                    .values()
                    .filter(|account| names.contains(&account.name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn resolve_accounts_by_id(
        &self,
        ctx: &RequestContext,
        ids: &[Uuid],
    ) -> Result<Vec<Account>, Self::Error> {
        self.record_call(ctx, DirectoryCall::AccountsById).await?;
        let data = self.data.read().await;
        Ok(data
            .get(ctx.tenant_id())
            .map(|tenant| {
                ids.iter()
                    .filter_map(|id| tenant.accounts.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl PrincipalStore for InMemoryDirectory {
    type Error = InMemoryDirectoryError;

    async fn current_associations(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
    ) -> Result<Vec<AccountRoleAssociation>, Self::Error> {
        self.record_call(ctx, DirectoryCall::CurrentAssociations).await?;
        let data = self.data.read().await;
        Ok(data
            .get(ctx.tenant_id())
            .and_then(|tenant| tenant.associations.get(&user_id))
            .cloned()
            .unwrap_or_default())
    }
}
