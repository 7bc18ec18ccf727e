//! Request context for entitlement operations.
//!
//! Every collaborator call receives the context of the request it serves so
//! stores can scope lookups to the request's tenant and log the request id.

use uuid::Uuid;

/// Request context for engine operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Unique identifier for this request
    pub request_id: String,
    /// Tenant the request operates in
    pub tenant_id: String,
}

impl RequestContext {
    /// Create a new request context with a specific request ID.
    pub fn new(request_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            tenant_id: tenant_id.into(),
        }
    }

    /// Create a new request context with a generated request ID.
    pub fn with_generated_id(tenant_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
        }
    }

    /// Get the tenant ID.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }
}
