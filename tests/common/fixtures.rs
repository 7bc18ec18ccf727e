//! A seeded in-memory tenant shared by the integration tests.
//!
//! Roles:
//!
//! | role           | scopes                                        |
//! |----------------|-----------------------------------------------|
//! | `system-admin` | `system`                                      |
//! | `member`       | `profile:read`                                |
//! | `editor`       | `profile:read`, `profile:write`               |
//! | `billing`      | `billing:read`, `billing:write`               |
//! | `manager`      | `profile:read`, `profile:write`, `billing:read` |
//!
//! Principals `admin` and `manager` hold `system-admin` and `manager` on
//! `headquarters`.

use super::builders::AttributesBuilder;
use entitlement_engine::access::{Account, Role};
use entitlement_engine::schema::{AttributeDefinition, AttributeKind};
use entitlement_engine::{
    CreateUserRequest, EntitlementEngine, EntitlementOutcome, InMemoryDirectory, RequestContext,
};

use std::collections::HashMap;
use uuid::Uuid;

pub struct TestTenant {
    pub tenant_id: String,
    pub directory: InMemoryDirectory,
    pub roles: HashMap<String, Role>,
    pub accounts: HashMap<String, Account>,
    pub admin: Uuid,
    pub manager: Uuid,
}

impl TestTenant {
    pub async fn seeded(tenant_id: &str) -> Self {
        Self::seeded_in(InMemoryDirectory::new(), tenant_id).await
    }

    /// Seed a tenant into a directory other tenants may share.
    pub async fn seeded_in(directory: InMemoryDirectory, tenant_id: &str) -> Self {
        let directory = directory.with_builtin_fields(tenant_id).await;
        for definition in [
            AttributeDefinition::new("employee_number", AttributeKind::Integer)
                .mandatory()
                .unique(),
            AttributeDefinition::new("department", AttributeKind::Text),
            AttributeDefinition::new("tags", AttributeKind::List).with_pattern("[a-z0-9-]+"),
            AttributeDefinition::new("start_date", AttributeKind::Date).read_only(),
            AttributeDefinition::new("preferences", AttributeKind::Document),
        ] {
            directory.add_definition(tenant_id, definition).await;
        }

        let roles: HashMap<String, Role> = [
            Role::new("system-admin", ["system"]),
            Role::new("member", ["profile:read"]),
            Role::new("editor", ["profile:read", "profile:write"]),
            Role::new("billing", ["billing:read", "billing:write"]),
            Role::new("manager", ["profile:read", "profile:write", "billing:read"]),
        ]
        .into_iter()
        .map(|role| (role.name.clone(), role))
        .collect();
        for role in roles.values() {
            directory.add_role(tenant_id, role.clone()).await;
        }

        let accounts: HashMap<String, Account> = ["headquarters", "branch", "lab"]
            .into_iter()
            .map(|name| (name.to_string(), Account::new(name)))
            .collect();
        for account in accounts.values() {
            directory.add_account(tenant_id, account.clone()).await;
        }

        let tenant = Self {
            tenant_id: tenant_id.to_string(),
            directory,
            roles,
            accounts,
            admin: Uuid::new_v4(),
            manager: Uuid::new_v4(),
        };
        tenant.grant(tenant.admin, "headquarters", "system-admin").await;
        tenant.grant(tenant.manager, "headquarters", "manager").await;
        tenant
    }

    pub fn role(&self, name: &str) -> &Role {
        &self.roles[name]
    }

    pub fn account(&self, name: &str) -> &Account {
        &self.accounts[name]
    }

    pub fn ctx(&self) -> RequestContext {
        RequestContext::with_generated_id(self.tenant_id.clone())
    }

    pub fn engine(&self) -> EntitlementEngine<InMemoryDirectory> {
        EntitlementEngine::new(self.directory.clone()).expect("default configuration is valid")
    }

    /// Store an association directly, bypassing the engine.
    pub async fn grant(&self, user_id: Uuid, account: &str, role: &str) {
        self.directory
            .associate(
                &self.tenant_id,
                user_id,
                self.account(account).id,
                self.role(role).id,
            )
            .await;
    }

    /// Persist an accepted outcome the way a host would.
    pub async fn persist(&self, outcome: &EntitlementOutcome) {
        assert!(outcome.is_ok(), "refusing to persist {:?}", outcome.to_result());
        let cleared: Vec<(Uuid, Uuid)> = outcome
            .cleared_attributes()
            .iter()
            .map(|attribute_id| (outcome.user_id, *attribute_id))
            .collect();
        self.directory
            .store_values(&self.tenant_id, outcome.attribute_rows(), &cleared)
            .await;
        if let Some(associations) = outcome.new_associations() {
            self.directory
                .replace_associations(&self.tenant_id, outcome.user_id, associations.to_vec())
                .await;
        }
    }

    /// Create and persist a user through the engine.
    pub async fn create_user(&self, username: &str, account: &str, role: &str) -> Uuid {
        let request = CreateUserRequest::new(AttributesBuilder::valid_new_user(username).build())
            .with_association(account, role)
            .acting_as(self.admin);
        let outcome = self
            .engine()
            .create_user(&self.ctx(), &request)
            .await
            .expect("create succeeds");
        self.persist(&outcome).await;
        outcome.user_id
    }
}
