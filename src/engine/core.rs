//! Core engine structure and initialization.

use crate::access::PermissionEvaluator;
use crate::context::RequestContext;
use crate::directory::EntitlementDirectory;
use crate::engine::builder::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::schema::AttributeSchemaRegistry;

use log::debug;

/// Entitlement engine validating user attributes and reconciling
/// account/role associations.
///
/// The engine holds no per-request state: every call builds its own schema
/// snapshot and lookup cache, so one engine can serve concurrent requests.
///
/// # Type Parameters
///
/// * `D` - The directory implementing every collaborator trait
pub struct EntitlementEngine<D> {
    pub(super) directory: D,
    pub(super) config: EngineConfig,
    pub(super) evaluator: PermissionEvaluator,
}

impl<D: EntitlementDirectory> EntitlementEngine<D> {
    /// Create an engine with the default configuration.
    pub fn new(directory: D) -> EngineResult<Self> {
        Self::with_config(directory, EngineConfig::default())
    }

    /// Create an engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if the configuration is invalid.
    pub fn with_config(directory: D, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let evaluator = PermissionEvaluator::new(config.system_scope.clone())
            .with_self_modification(config.allow_self_modification);
        Ok(Self {
            directory,
            config,
            evaluator,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn evaluator(&self) -> &PermissionEvaluator {
        &self.evaluator
    }

    /// Load the tenant's attribute schema snapshot.
    pub async fn load_registry(&self, ctx: &RequestContext) -> EngineResult<AttributeSchemaRegistry> {
        let definitions = self
            .directory
            .list_definitions(ctx)
            .await
            .map_err(|e| EngineError::collaborator("attribute_schema.list_definitions", [ctx.tenant_id()], e))?;
        debug!(
            "Loaded {} attribute definitions for tenant {}",
            definitions.len(),
            ctx.tenant_id()
        );
        Ok(AttributeSchemaRegistry::from_definitions(definitions)?)
    }
}
