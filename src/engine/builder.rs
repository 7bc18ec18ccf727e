//! Configuration and builder for entitlement engine instances.

use crate::association::ALL_ROLES_MARKER;
use crate::directory::EntitlementDirectory;
use crate::engine::EntitlementEngine;
use crate::error::{EngineError, EngineResult};

use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// Every field has a default, so a partial JSON document is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Scope that permits modifying any role. Defaults to "system".
    pub system_scope: String,

    /// Whether a principal may modify a role set identical to its own.
    pub allow_self_modification: bool,

    /// Report changes to read-only attributes of existing users.
    pub enforce_read_only: bool,

    /// Account a new user is associated with when the create request names none.
    pub default_account: Option<String>,

    /// Role granted on `default_account`.
    pub default_role: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_scope: "system".to_string(),
            allow_self_modification: true,
            enforce_read_only: false,
            default_account: None,
            default_role: None,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json(content: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| EngineError::configuration(format!("Malformed engine configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.system_scope.trim().is_empty() {
            return Err(EngineError::configuration("System scope cannot be empty"));
        }

        match (&self.default_account, &self.default_role) {
            (None, None) => Ok(()),
            (Some(account), Some(role)) => {
                if account.trim().is_empty() {
                    return Err(EngineError::configuration("Default account cannot be empty"));
                }
                if role.trim().is_empty() || role.trim() == ALL_ROLES_MARKER {
                    return Err(EngineError::configuration(
                        "Default role must name a single role",
                    ));
                }
                Ok(())
            }
            _ => Err(EngineError::configuration(
                "Default account and default role must be configured together",
            )),
        }
    }

    /// The configured default (account, role) pair, if any.
    pub fn default_association(&self) -> Option<(&str, &str)> {
        match (&self.default_account, &self.default_role) {
            (Some(account), Some(role)) => Some((account, role)),
            _ => None,
        }
    }
}

/// Builder for configuring and creating entitlement engines.
///
/// # Examples
///
/// ```rust
/// use entitlement_engine::EntitlementEngineBuilder;
/// use entitlement_engine::directory::InMemoryDirectory;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = EntitlementEngineBuilder::new(InMemoryDirectory::new())
///     .with_system_scope("platform:admin")
///     .with_read_only_enforcement(true)
///     .with_default_association("default", "member")
///     .build()?;
/// assert_eq!(engine.config().system_scope, "platform:admin");
/// # Ok(())
/// # }
/// ```
pub struct EntitlementEngineBuilder<D> {
    directory: D,
    config: EngineConfig,
}

impl<D: EntitlementDirectory> EntitlementEngineBuilder<D> {
    /// Create a builder with the default configuration.
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            config: EngineConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_system_scope(mut self, scope: impl Into<String>) -> Self {
        self.config.system_scope = scope.into();
        self
    }

    /// Enable or disable the self-modification rule of the permission check.
    pub fn with_self_modification(mut self, allowed: bool) -> Self {
        self.config.allow_self_modification = allowed;
        self
    }

    pub fn with_read_only_enforcement(mut self, enabled: bool) -> Self {
        self.config.enforce_read_only = enabled;
        self
    }

    /// Association given to new users whose create request names none.
    pub fn with_default_association(
        mut self,
        account: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        self.config.default_account = Some(account.into());
        self.config.default_role = Some(role.into());
        self
    }

    /// Build the configured engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if the configuration is invalid.
    pub fn build(self) -> EngineResult<EntitlementEngine<D>> {
        EntitlementEngine::with_config(self.directory, self.config)
    }
}
