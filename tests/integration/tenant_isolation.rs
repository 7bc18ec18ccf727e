//! Tenants sharing one directory never see each other's data.

use crate::common::builders::{AttributesBuilder, BatchBuilder};
use crate::common::fixtures::TestTenant;
use crate::common::init_logging;

use entitlement_engine::schema::{AttributeDefinition, AttributeKind, RecordState};
use entitlement_engine::{AttributeViolation, CreateUserRequest, InMemoryDirectory, RejectionKind};
use uuid::Uuid;

async fn two_tenants(prefix: &str) -> (TestTenant, TestTenant) {
    let directory = InMemoryDirectory::new();
    let first = TestTenant::seeded_in(directory.clone(), &format!("{}-a", prefix)).await;
    let second = TestTenant::seeded_in(directory, &format!("{}-b", prefix)).await;
    (first, second)
}

#[tokio::test]
async fn test_role_names_resolve_per_tenant() {
    init_logging();
    let (first, second) = two_tenants("iso-roles").await;
    assert_ne!(first.role("member").id, second.role("member").id);

    let user = second.create_user("alice", "lab", "member").await;

    let stored = second
        .directory
        .associations_of(&second.tenant_id, user)
        .await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].role_id, second.role("member").id);
    assert_eq!(stored[0].account_id, second.account("lab").id);
    assert!(
        first
            .directory
            .associations_of(&first.tenant_id, user)
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_unique_values_are_scoped_to_the_tenant() {
    init_logging();
    let (first, second) = two_tenants("iso-unique").await;
    first.create_user("bob", "headquarters", "member").await;
    second.create_user("bob", "headquarters", "member").await;

    let request = CreateUserRequest::new(
        AttributesBuilder::valid_new_user("bob")
            .with("email", "another-bob@example.com")
            .build(),
    )
    .with_association("branch", "member");
    let outcome = first
        .engine()
        .create_user(&first.ctx(), &request)
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
async fn test_definitions_are_scoped_to_the_tenant() {
    init_logging();
    let (first, second) = two_tenants("iso-schema").await;
    first
        .directory
        .add_definition(
            &first.tenant_id,
            AttributeDefinition::new("clearance", AttributeKind::Integer),
        )
        .await;
    let proposed = AttributesBuilder::new().with("clearance", 3).build();
    let state = RecordState::Existing(Uuid::new_v4());

    let accepted = first
        .engine()
        .validate_attributes(&first.ctx(), &proposed, state)
        .await
        .unwrap();
    assert!(accepted.is_ok());

    let rejected = second
        .engine()
        .validate_attributes(&second.ctx(), &proposed, state)
        .await
        .unwrap();
    assert_eq!(rejected.result.unknown, vec!["clearance".to_string()]);
}

#[tokio::test]
async fn test_associations_are_scoped_to_the_tenant() {
    init_logging();
    let (first, second) = two_tenants("iso-assoc").await;
    let user = first.create_user("carol", "headquarters", "member").await;

    let outcome = second
        .engine()
        .associate(
            &second.ctx(),
            user,
            second.admin,
            &BatchBuilder::new().remove("headquarters", "member").build(),
        )
        .await
        .unwrap();

    crate::assert_rejected!(outcome, RejectionKind::InvalidAssociationOperation);
}

#[tokio::test]
async fn test_concurrent_requests_across_tenants() {
    init_logging();
    let (first, second) = two_tenants("iso-concurrent").await;
    let first_engine = first.engine();
    let second_engine = second.engine();

    let requests: Vec<_> = (0..8)
        .map(|i| {
            CreateUserRequest::new(AttributesBuilder::valid_new_user(&format!("user{}", i)).build())
                .with_association("branch", "member")
                .acting_as(if i % 2 == 0 { first.admin } else { second.admin })
        })
        .collect();

    let outcomes = futures::future::join_all(requests.iter().enumerate().map(|(i, request)| {
        let (engine, tenant) = if i % 2 == 0 {
            (&first_engine, &first)
        } else {
            (&second_engine, &second)
        };
        async move { engine.create_user(&tenant.ctx(), request).await }
    }))
    .await;

    for (i, outcome) in outcomes.into_iter().enumerate() {
        let outcome = outcome.unwrap();
        assert!(outcome.is_ok(), "{:?}", outcome.to_result());
        let tenant = if i % 2 == 0 { &first } else { &second };
        let associations = outcome.new_associations().unwrap();
        assert_eq!(associations[0].account_id, tenant.account("branch").id);
        assert_eq!(associations[0].role_id, tenant.role("member").id);
    }
}
