//! Scope-based permission checks on association changes.

use crate::common::builders::BatchBuilder;
use crate::common::fixtures::TestTenant;
use crate::common::init_logging;

use entitlement_engine::access::PermitReason;
use entitlement_engine::{
    AssociationRejection, EngineError, EntitlementEngineBuilder, LookupCache, PermissionDecision,
    RejectionKind,
};
use std::collections::BTreeSet;
use uuid::Uuid;

fn roles(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[tokio::test]
async fn test_system_scope_grants_any_role() {
    init_logging();
    let tenant = TestTenant::seeded("perm-system").await;
    let user = tenant.create_user("alice", "headquarters", "member").await;

    let outcome = tenant
        .engine()
        .associate(
            &tenant.ctx(),
            user,
            tenant.admin,
            &BatchBuilder::new()
                .add("lab", "billing")
                .add("branch", "system-admin")
                .build(),
        )
        .await
        .unwrap();

    assert!(outcome.is_applied(), "{:?}", outcome.to_result());
}

#[tokio::test]
async fn test_scope_superset_permits_grant() {
    init_logging();
    let tenant = TestTenant::seeded("perm-superset").await;
    let user = tenant.create_user("bob", "headquarters", "member").await;

    let outcome = tenant
        .engine()
        .associate(
            &tenant.ctx(),
            user,
            tenant.manager,
            &BatchBuilder::new().add("branch", "editor").build(),
        )
        .await
        .unwrap();

    assert!(outcome.is_applied());
}

#[tokio::test]
async fn test_missing_scope_denies_grant() {
    init_logging();
    let tenant = TestTenant::seeded("perm-denied").await;
    let user = tenant.create_user("carol", "headquarters", "member").await;

    let outcome = tenant
        .engine()
        .associate(
            &tenant.ctx(),
            user,
            tenant.manager,
            &BatchBuilder::new()
                .add("branch", "editor")
                .add("branch", "billing")
                .build(),
        )
        .await
        .unwrap();

    match outcome.rejection() {
        Some(AssociationRejection::PermissionDenied { acting_user, roles }) => {
            assert_eq!(*acting_user, tenant.manager);
            assert_eq!(roles, &vec!["billing".to_string(), "editor".to_string()]);
        }
        other => panic!("expected permission denial, got {:?}", other),
    }
    assert_eq!(outcome.to_result().errors.len(), 2);
}

#[tokio::test]
async fn test_revocation_needs_the_same_scopes() {
    init_logging();
    let tenant = TestTenant::seeded("perm-revoke").await;
    let user = tenant.create_user("dave", "headquarters", "member").await;
    tenant.grant(user, "lab", "billing").await;

    let outcome = tenant
        .engine()
        .associate(
            &tenant.ctx(),
            user,
            tenant.manager,
            &BatchBuilder::new().remove("lab", "billing").build(),
        )
        .await
        .unwrap();

    crate::assert_rejected!(outcome, RejectionKind::PermissionDenied);
}

#[tokio::test]
async fn test_principal_without_roles_is_denied() {
    init_logging();
    let tenant = TestTenant::seeded("perm-nobody").await;
    let user = tenant.create_user("erin", "headquarters", "member").await;

    let outcome = tenant
        .engine()
        .associate(
            &tenant.ctx(),
            user,
            Uuid::new_v4(),
            &BatchBuilder::new().add("lab", "member").build(),
        )
        .await
        .unwrap();

    crate::assert_rejected!(outcome, RejectionKind::PermissionDenied);
}

#[tokio::test]
async fn test_self_modification_shortcut() {
    init_logging();
    let tenant = TestTenant::seeded("perm-self").await;
    let engine = tenant.engine();

    let decision = engine
        .evaluator()
        .is_permitted(
            &tenant.ctx(),
            engine.directory(),
            &mut LookupCache::new(),
            tenant.manager,
            &roles(&["manager"]),
        )
        .await
        .unwrap();
    assert_eq!(
        decision,
        PermissionDecision::Permitted(PermitReason::SelfModification)
    );

    let strict = EntitlementEngineBuilder::new(tenant.directory.clone())
        .with_self_modification(false)
        .build()
        .unwrap();
    let decision = strict
        .evaluator()
        .is_permitted(
            &tenant.ctx(),
            strict.directory(),
            &mut LookupCache::new(),
            tenant.manager,
            &roles(&["manager"]),
        )
        .await
        .unwrap();
    assert_eq!(
        decision,
        PermissionDecision::Permitted(PermitReason::ScopeSuperset)
    );
}

#[tokio::test]
async fn test_custom_system_scope() {
    init_logging();
    let tenant = TestTenant::seeded("perm-custom-scope").await;
    let user = tenant.create_user("frank", "headquarters", "member").await;
    let engine = EntitlementEngineBuilder::new(tenant.directory.clone())
        .with_system_scope("billing:write")
        .build()
        .unwrap();
    let accountant = Uuid::new_v4();
    tenant.grant(accountant, "headquarters", "billing").await;

    let outcome = engine
        .associate(
            &tenant.ctx(),
            user,
            accountant,
            &BatchBuilder::new().add("lab", "editor").build(),
        )
        .await
        .unwrap();

    assert!(outcome.is_applied(), "{:?}", outcome.to_result());
}

#[tokio::test]
async fn test_deleted_held_role_is_an_error_not_a_denial() {
    init_logging();
    let tenant = TestTenant::seeded("perm-deleted").await;
    let user = tenant.create_user("grace", "headquarters", "member").await;
    let principal = Uuid::new_v4();
    tenant.grant(principal, "headquarters", "billing").await;
    tenant
        .directory
        .remove_role(&tenant.tenant_id, tenant.role("billing").id)
        .await;

    let result = tenant
        .engine()
        .associate(
            &tenant.ctx(),
            user,
            principal,
            &BatchBuilder::new().add("lab", "member").build(),
        )
        .await;

    match result {
        Err(EngineError::UnresolvedRole { principal: p, roles }) => {
            assert_eq!(p, principal);
            assert_eq!(roles, vec![tenant.role("billing").id.to_string()]);
        }
        other => panic!("expected unresolved role error, got {:?}", other),
    }
}
