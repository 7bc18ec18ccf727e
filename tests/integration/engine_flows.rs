//! Create and patch flows through the engine.

use crate::common::builders::{AttributesBuilder, BatchBuilder};
use crate::common::fixtures::TestTenant;
use crate::common::init_logging;

use entitlement_engine::directory::DirectoryCall;
use entitlement_engine::{
    AssociationRejection, AttributeViolation, CreateUserRequest, EntitlementEngineBuilder,
    PatchUserRequest, RejectionKind,
};
use serde_json::json;

#[tokio::test]
async fn test_created_user_can_be_patched() {
    init_logging();
    let tenant = TestTenant::seeded("flows-create-patch").await;
    let user = tenant.create_user("alice", "headquarters", "member").await;

    let stored = tenant
        .directory
        .associations_of(&tenant.tenant_id, user)
        .await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].role_id, tenant.role("member").id);

    let request = PatchUserRequest::new(user, tenant.manager)
        .with_attributes(
            AttributesBuilder::new()
                .with("department", "Research")
                .with("tags", json!(["rust", "oncall"]))
                .build(),
        )
        .with_change(entitlement_engine::AssociationChangeRequest::add(
            "branch", "editor",
        ));
    let outcome = tenant
        .engine()
        .patch_user(&tenant.ctx(), &request)
        .await
        .unwrap();

    assert!(outcome.is_ok(), "{:?}", outcome.to_result());
    tenant.persist(&outcome).await;
    assert_eq!(
        tenant
            .directory
            .associations_of(&tenant.tenant_id, user)
            .await
            .len(),
        2
    );
}

#[tokio::test]
async fn test_create_reports_attribute_and_association_problems() {
    init_logging();
    let tenant = TestTenant::seeded("flows-create-both").await;

    let request = CreateUserRequest::new(
        AttributesBuilder::valid_new_user("bob")
            .without("employee_number")
            .with("favourite_color", "green")
            .build(),
    )
    .with_association("atlantis", "member")
    .acting_as(tenant.admin);

    let outcome = tenant
        .engine()
        .create_user(&tenant.ctx(), &request)
        .await
        .unwrap();

    assert!(!outcome.is_ok());
    assert_eq!(
        outcome.violations(),
        vec![
            AttributeViolation::UnknownAttribute {
                attributes: vec!["favourite_color".to_string()]
            },
            AttributeViolation::MissingMandatory {
                attributes: vec!["employee_number".to_string()]
            },
        ]
    );
    crate::assert_rejected!(outcome, RejectionKind::InvalidAssociationReference);
    assert!(outcome.attribute_rows().is_empty());
    assert!(outcome.new_associations().is_none());
}

#[tokio::test]
async fn test_duplicate_username_is_reported() {
    init_logging();
    let tenant = TestTenant::seeded("flows-duplicate").await;
    tenant.create_user("carol", "headquarters", "member").await;

    let request = CreateUserRequest::new(
        AttributesBuilder::valid_new_user("CAROL")
            .username("carol")
            .with("email", "someone-else@example.com")
            .build(),
    )
    .with_association("headquarters", "member");

    let outcome = tenant
        .engine()
        .create_user(&tenant.ctx(), &request)
        .await
        .unwrap();
    assert_eq!(
        outcome.violations(),
        vec![AttributeViolation::DuplicateValue {
            attributes: vec!["username".to_string()]
        }]
    );
}

#[tokio::test]
async fn test_user_may_keep_its_own_unique_values() {
    init_logging();
    let tenant = TestTenant::seeded("flows-own-values").await;
    let user = tenant.create_user("dave", "headquarters", "member").await;

    let request = PatchUserRequest::new(user, tenant.admin).with_attributes(
        AttributesBuilder::new()
            .username("dave")
            .with("email", "dave@example.com")
            .build(),
    );
    let outcome = tenant
        .engine()
        .patch_user(&tenant.ctx(), &request)
        .await
        .unwrap();
    assert!(outcome.is_ok(), "{:?}", outcome.to_result());
}

#[tokio::test]
async fn test_patch_clears_attribute() {
    init_logging();
    let tenant = TestTenant::seeded("flows-clear").await;
    let user = tenant.create_user("erin", "headquarters", "member").await;
    let email_id = entitlement_engine::schema::user_field("email")
        .map(|field| field.id())
        .unwrap();
    assert!(
        tenant
            .directory
            .value_of(&tenant.tenant_id, user, email_id)
            .await
            .is_some()
    );

    let request = PatchUserRequest::new(user, tenant.admin)
        .with_attributes(AttributesBuilder::new().cleared("email").build());
    let outcome = tenant
        .engine()
        .patch_user(&tenant.ctx(), &request)
        .await
        .unwrap();
    tenant.persist(&outcome).await;

    assert!(
        tenant
            .directory
            .value_of(&tenant.tenant_id, user, email_id)
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_patch_reports_both_failures_together() {
    init_logging();
    let tenant = TestTenant::seeded("flows-patch-both").await;
    let user = tenant.create_user("frank", "headquarters", "member").await;

    let mut request = PatchUserRequest::new(user, tenant.admin)
        .with_attributes(AttributesBuilder::new().with("employee_number", "twelve").build());
    request.association_changes = BatchBuilder::new().remove("headquarters", "member").build();

    let outcome = tenant
        .engine()
        .patch_user(&tenant.ctx(), &request)
        .await
        .unwrap();

    let result = outcome.to_result();
    assert!(!result.ok);
    assert_eq!(
        result.attributes.unwrap().invalid,
        vec!["employee_number".to_string()]
    );
    let associations = result.associations.unwrap();
    assert_eq!(
        associations.rejection,
        Some(RejectionKind::CannotFullyDisassociate)
    );
    assert!(associations.new_associations.is_empty());
}

#[tokio::test]
async fn test_read_only_enforcement() {
    init_logging();
    let tenant = TestTenant::seeded("flows-read-only").await;
    let user = tenant.create_user("grace", "headquarters", "member").await;
    let engine = EntitlementEngineBuilder::new(tenant.directory.clone())
        .with_read_only_enforcement(true)
        .build()
        .unwrap();

    let request = PatchUserRequest::new(user, tenant.admin)
        .with_attributes(AttributesBuilder::new().with("start_date", "2021-03-01").build());
    let outcome = engine.patch_user(&tenant.ctx(), &request).await.unwrap();

    assert_eq!(
        outcome.violations(),
        vec![AttributeViolation::ReadOnlyAttribute {
            attributes: vec!["start_date".to_string()]
        }]
    );
    let value = serde_json::to_value(outcome.to_result()).unwrap();
    assert_eq!(value["attributes"]["readOnly"], json!(["start_date"]));
}

#[tokio::test]
async fn test_create_without_acting_user_skips_permission_check() {
    init_logging();
    let tenant = TestTenant::seeded("flows-bootstrap").await;

    let request = CreateUserRequest::new(AttributesBuilder::valid_new_user("heidi").build())
        .with_association("lab", "system-admin");
    let outcome = tenant
        .engine()
        .create_user(&tenant.ctx(), &request)
        .await
        .unwrap();

    assert!(outcome.is_ok());
    assert_eq!(
        tenant
            .directory
            .call_count(DirectoryCall::CurrentAssociations)
            .await,
        0
    );
}

#[tokio::test]
async fn test_create_by_underprivileged_principal_is_denied() {
    init_logging();
    let tenant = TestTenant::seeded("flows-create-denied").await;

    let request = CreateUserRequest::new(AttributesBuilder::valid_new_user("ivan").build())
        .with_association("lab", "billing")
        .acting_as(tenant.manager);
    let outcome = tenant
        .engine()
        .create_user(&tenant.ctx(), &request)
        .await
        .unwrap();

    assert!(outcome.violations().is_empty());
    assert!(matches!(
        outcome.rejection(),
        Some(AssociationRejection::PermissionDenied { roles, .. }) if roles == &vec!["billing".to_string()]
    ));
}

#[tokio::test]
async fn test_request_wire_format() {
    init_logging();
    let tenant = TestTenant::seeded("flows-wire").await;
    let user = tenant.create_user("judy", "headquarters", "member").await;

    let request: PatchUserRequest = serde_json::from_value(json!({
        "userId": user,
        "actingUser": tenant.admin,
        "associationChanges": [
            { "accountRef": "lab", "target": "billing", "op": "add" },
            { "accountRef": "headquarters", "target": "*", "op": "remove_all_for_account" }
        ]
    }))
    .unwrap();

    let outcome = tenant
        .engine()
        .patch_user(&tenant.ctx(), &request)
        .await
        .unwrap();
    let value = serde_json::to_value(outcome.to_result()).unwrap();

    assert_eq!(value["ok"], json!(true));
    assert!(value.get("attributes").is_none());
    assert_eq!(
        value["associations"]["newAssociations"],
        json!([{ "accountId": tenant.account("lab").id, "roleId": tenant.role("billing").id }])
    );
}
