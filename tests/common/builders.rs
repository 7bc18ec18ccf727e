//! Fluent builders for attribute maps and association change batches.

use entitlement_engine::AssociationChangeRequest;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicI64, Ordering};

static EMPLOYEE_NUMBERS: AtomicI64 = AtomicI64::new(1000);

/// Builder for proposed attribute maps.
#[derive(Debug, Clone, Default)]
pub struct AttributesBuilder {
    attributes: Map<String, Value>,
}

impl AttributesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new-user attribute set satisfying every mandatory attribute of
    /// the seeded tenant, with a fresh employee number.
    pub fn valid_new_user(username: &str) -> Self {
        Self::new()
            .username(username)
            .with("email", format!("{}@example.com", username))
            .with(
                "employee_number",
                EMPLOYEE_NUMBERS.fetch_add(1, Ordering::Relaxed),
            )
    }

    pub fn username(self, username: &str) -> Self {
        self.with("username", username)
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Clear an attribute in a patch.
    pub fn cleared(mut self, name: &str) -> Self {
        self.attributes.insert(name.to_string(), Value::Null);
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.attributes.remove(name);
        self
    }

    pub fn build(self) -> Map<String, Value> {
        self.attributes
    }
}

/// Builder for association change batches.
#[derive(Debug, Clone, Default)]
pub struct BatchBuilder {
    requests: Vec<AssociationChangeRequest>,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, account: &str, role: &str) -> Self {
        self.requests.push(AssociationChangeRequest::add(account, role));
        self
    }

    pub fn remove(mut self, account: &str, role: &str) -> Self {
        self.requests
            .push(AssociationChangeRequest::remove_specific(account, role));
        self
    }

    pub fn remove_all(mut self, account: &str) -> Self {
        self.requests
            .push(AssociationChangeRequest::remove_all_for_account(account));
        self
    }

    pub fn build(self) -> Vec<AssociationChangeRequest> {
        self.requests
    }
}
