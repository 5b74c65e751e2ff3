//! Kernel configuration types.
//!
//! The configuration document is hierarchical; the kernel reads its own
//! sections and pre-splits the rest into opaque per-component slices:
//!
//! ```toml
//! environment = "production"
//!
//! [timeouts]
//! config_change_seconds = 5
//! module_operation_seconds = 10
//! gateway_operation_seconds = 10
//!
//! [[auth.roles]]
//! name = "operator"
//! permissions = ["kernel.module.enable", "kernel.module.disable"]
//!
//! [modules.billing]
//! workers = 4
//!
//! [gateways.http]
//! address = ":8080"
//! ```
//!
//! File discovery, watching, and environment-variable merging belong to
//! the embedding application; this module covers parsing, validation, and
//! slice access. All types implement [`Default`] for compile-time
//! fallback values.

use std::collections::HashMap;
use std::time::Duration;

use banyan_auth::{ConfigRoleProvider, Role};
use banyan_component::ConfigValue;
use banyan_types::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Deployment environment tag, validated at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development; permissive defaults are acceptable.
    #[default]
    Development,
    /// Pre-production staging.
    Staging,
    /// Production.
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Timeout settings for kernel-bounded operations, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Bound on the `on_config_changed` fan-out.
    pub config_change_seconds: u64,

    /// Default bound on module lifecycle calls.
    pub module_operation_seconds: u64,

    /// Default bound on gateway lifecycle calls.
    pub gateway_operation_seconds: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            config_change_seconds: 5,
            module_operation_seconds: 10,
            gateway_operation_seconds: 10,
        }
    }
}

impl TimeoutsConfig {
    /// Config-change fan-out bound as a [`Duration`].
    #[must_use]
    pub fn config_change(&self) -> Duration {
        Duration::from_secs(self.config_change_seconds)
    }

    /// Module operation bound as a [`Duration`].
    #[must_use]
    pub fn module_operation(&self) -> Duration {
        Duration::from_secs(self.module_operation_seconds)
    }

    /// Gateway operation bound as a [`Duration`].
    #[must_use]
    pub fn gateway_operation(&self) -> Duration {
        Duration::from_secs(self.gateway_operation_seconds)
    }
}

/// RBAC rules section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Role definitions for the built-in role provider.
    pub roles: Vec<Role>,
}

/// The application configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Deployment environment tag.
    pub environment: Environment,

    /// Timeout settings.
    pub timeouts: TimeoutsConfig,

    /// RBAC rules.
    pub auth: AuthConfig,

    /// Opaque per-module configuration slices.
    pub modules: HashMap<String, ConfigValue>,

    /// Opaque per-gateway configuration slices.
    pub gateways: HashMap<String, ConfigValue>,

    /// Reserved for infrastructure adapters; the kernel ignores it.
    pub infrastructure: HashMap<String, ConfigValue>,
}

impl KernelConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML or an unknown
    /// `environment`, [`ConfigError::InvalidTimeout`] on a zero timeout.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes back to TOML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Serialize`] if the document cannot be rendered.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks the document for invalid values.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidTimeout`] when any timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("timeouts.config_change_seconds", self.timeouts.config_change_seconds),
            ("timeouts.module_operation_seconds", self.timeouts.module_operation_seconds),
            ("timeouts.gateway_operation_seconds", self.timeouts.gateway_operation_seconds),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidTimeout { field });
            }
        }
        Ok(())
    }

    /// Returns a module's configuration slice, if present.
    #[must_use]
    pub fn module_config(&self, name: &str) -> Option<&ConfigValue> {
        self.modules.get(name)
    }

    /// Returns a gateway's configuration slice, if present.
    #[must_use]
    pub fn gateway_config(&self, name: &str) -> Option<&ConfigValue> {
        self.gateways.get(name)
    }

    /// Builds the role provider from the `auth.roles` section.
    #[must_use]
    pub fn role_provider(&self) -> ConfigRoleProvider {
        ConfigRoleProvider::new(self.auth.roles.iter().cloned())
    }
}

/// Configuration parse and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid TOML or contains an invalid enum value.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The document could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A timeout was configured as zero.
    #[error("{field} must be a positive integer")]
    InvalidTimeout {
        /// Dotted path of the offending field.
        field: &'static str,
    },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "CONFIG_PARSE",
            Self::Serialize(_) => "CONFIG_SERIALIZE",
            Self::InvalidTimeout { .. } => "CONFIG_INVALID_TIMEOUT",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
