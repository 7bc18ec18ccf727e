//! Property-based tests for the value codec and association reconciliation.
//!
//! Uses proptest to generate values and change batches with automatic
//! shrinking.

use entitlement_engine::access::{Account, PermissionEvaluator, Role};
use entitlement_engine::schema::AttributeKind;
use entitlement_engine::schema::codec::{self, TypedValue};
use entitlement_engine::{
    AccountRoleAssociation, AssociationChangeRequest, AssociationReconciler, InMemoryDirectory,
    LookupCache, Reconciliation, ReconciliationSubject, RequestContext,
};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

const TENANT: &str = "property-tenant";
const SIZE: usize = 3;

fn round_trip(value: TypedValue) -> TypedValue {
    let kind = value.kind();
    let stored = codec::encode(kind, &value).unwrap();
    codec::decode(kind, &stored).unwrap()
}

proptest! {
    #[test]
    fn test_integer_round_trip(i in any::<i64>()) {
        prop_assert_eq!(round_trip(TypedValue::Integer(i)), TypedValue::Integer(i));
    }

    #[test]
    fn test_decimal_round_trip(d in prop::num::f64::NORMAL | prop::num::f64::ZERO) {
        prop_assert_eq!(round_trip(TypedValue::Decimal(d)), TypedValue::Decimal(d));
    }

    #[test]
    fn test_boolean_round_trip(b in any::<bool>()) {
        prop_assert_eq!(round_trip(TypedValue::Boolean(b)), TypedValue::Boolean(b));
    }

    #[test]
    fn test_text_round_trip(s in any::<String>()) {
        prop_assert_eq!(round_trip(TypedValue::Text(s.clone())), TypedValue::Text(s));
    }

    #[test]
    fn test_uuid_round_trip(bytes in any::<[u8; 16]>()) {
        let id = Uuid::from_bytes(bytes);
        prop_assert_eq!(round_trip(TypedValue::Uuid(id)), TypedValue::Uuid(id));
    }

    #[test]
    fn test_date_round_trip(days in 1i32..3_652_059) {
        let date = chrono::NaiveDate::from_num_days_from_ce_opt(days).unwrap();
        prop_assert_eq!(round_trip(TypedValue::Date(date)), TypedValue::Date(date));
    }

    #[test]
    fn test_list_round_trip(items in prop::collection::vec("[a-z0-9 -]{0,12}", 0..6)) {
        let value = TypedValue::List(items.clone());
        if items.iter().any(String::is_empty) {
            prop_assert!(codec::encode(AttributeKind::List, &value).is_err());
        } else {
            prop_assert_eq!(round_trip(value), TypedValue::List(items));
        }
    }

    #[test]
    fn test_decoding_never_panics(raw in any::<String>()) {
        for kind in AttributeKind::ALL {
            let _ = codec::decode(kind, &raw);
        }
    }
}

/// A tenant with `SIZE` accounts and roles and an administrator.
struct World {
    directory: InMemoryDirectory,
    accounts: Vec<Account>,
    roles: Vec<Role>,
    admin: Uuid,
    user: Uuid,
}

impl World {
    async fn new() -> Self {
        let directory = InMemoryDirectory::new();
        let accounts: Vec<Account> = (0..SIZE).map(|i| Account::new(format!("acc{}", i))).collect();
        let roles: Vec<Role> = (0..SIZE)
            .map(|i| Role::new(format!("role{}", i), [format!("scope:{}", i)]))
            .collect();
        for account in &accounts {
            directory.add_account(TENANT, account.clone()).await;
        }
        for role in &roles {
            directory.add_role(TENANT, role.clone()).await;
        }
        let root = Role::new("root", ["system"]);
        directory.add_role(TENANT, root.clone()).await;
        let admin = Uuid::new_v4();
        directory.associate(TENANT, admin, accounts[0].id, root.id).await;

        Self {
            directory,
            accounts,
            roles,
            admin,
            user: Uuid::new_v4(),
        }
    }

    fn association(&self, (account, role): (usize, usize)) -> AccountRoleAssociation {
        AccountRoleAssociation::new(self.user, self.accounts[account].id, self.roles[role].id)
    }

    async fn reconcile(
        &self,
        current: &[AccountRoleAssociation],
        requests: &[AssociationChangeRequest],
    ) -> Reconciliation {
        let evaluator = PermissionEvaluator::new("system");
        AssociationReconciler::new(&evaluator)
            .reconcile(
                &RequestContext::with_generated_id(TENANT),
                &self.directory,
                &mut LookupCache::new(),
                ReconciliationSubject::new(self.user, self.admin, current),
                requests,
            )
            .await
            .unwrap()
    }
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Add(usize, usize),
    Remove(usize, usize),
    RemoveAll(usize),
}

impl Op {
    fn request(&self) -> AssociationChangeRequest {
        match *self {
            Op::Add(a, r) => AssociationChangeRequest::add(format!("acc{}", a), format!("role{}", r)),
            Op::Remove(a, r) => {
                AssociationChangeRequest::remove_specific(format!("acc{}", a), format!("role{}", r))
            }
            Op::RemoveAll(a) => AssociationChangeRequest::remove_all_for_account(format!("acc{}", a)),
        }
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..SIZE, 0..SIZE).prop_map(|(a, r)| Op::Add(a, r)),
        (0..SIZE, 0..SIZE).prop_map(|(a, r)| Op::Remove(a, r)),
        (0..SIZE).prop_map(Op::RemoveAll),
    ]
}

fn current_strategy() -> impl Strategy<Value = BTreeSet<(usize, usize)>> {
    prop::collection::btree_set((0..SIZE, 0..SIZE), 0..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_applied_batch_never_empties_a_user(
        pairs in current_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..6)
    ) {
        tokio_test::block_on(async {
            let world = World::new().await;
            let current: Vec<_> = pairs.iter().map(|p| world.association(*p)).collect();
            let requests: Vec<_> = ops.iter().map(Op::request).collect();

            let outcome = world.reconcile(&current, &requests).await;

            if let Reconciliation::Applied(changes) = outcome {
                if !current.is_empty() {
                    assert!(!changes.associations.is_empty());
                }
                let distinct: HashSet<_> = changes.associations.iter().collect();
                assert_eq!(distinct.len(), changes.associations.len());
                for op in &ops {
                    if let Op::Add(a, r) = *op {
                        assert!(changes.associations.contains(&world.association((a, r))));
                    }
                }
            }
        });
    }

    #[test]
    fn test_empty_batch_returns_current_set(pairs in current_strategy()) {
        tokio_test::block_on(async {
            let world = World::new().await;
            let current: Vec<_> = pairs.iter().map(|p| world.association(*p)).collect();

            let outcome = world.reconcile(&current, &[]).await;

            assert_eq!(outcome.associations(), Some(current.as_slice()));
            assert_eq!(world.directory.total_calls().await, 0);
        });
    }
}
