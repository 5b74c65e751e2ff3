//! Health reporting types.
//!
//! Modules and gateways may report health through the optional `health`
//! lifecycle hook; the kernel aggregates reports into a map keyed
//! `module:<name>` / `gateway:<name>`. Components without a reporter are
//! presumed healthy.

use serde::{Deserialize, Serialize};

/// Coarse component health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Operating normally.
    #[default]
    Healthy,
    /// Operating with reduced capability.
    Degraded,
    /// Not operating.
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// A component health report.
///
/// # Example
///
/// ```
/// use banyan_component::HealthStatus;
///
/// let ok = HealthStatus::healthy();
/// assert!(ok.is_healthy());
///
/// let degraded = HealthStatus::degraded("cache cold");
/// assert!(!degraded.is_healthy());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Health classification.
    pub state: HealthState,

    /// Optional free-form detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Error description, present for unhealthy reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    /// A healthy report with no detail.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            state: HealthState::Healthy,
            message: None,
            error: None,
        }
    }

    /// A healthy report carrying an explanatory message.
    #[must_use]
    pub fn healthy_with_message(message: impl Into<String>) -> Self {
        Self {
            state: HealthState::Healthy,
            message: Some(message.into()),
            error: None,
        }
    }

    /// A degraded report with a reason.
    #[must_use]
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            state: HealthState::Degraded,
            message: Some(message.into()),
            error: None,
        }
    }

    /// An unhealthy report with an error description.
    #[must_use]
    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            state: HealthState::Unhealthy,
            message: None,
            error: Some(error.into()),
        }
    }

    /// Returns `true` for [`HealthState::Healthy`].
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::healthy()
    }
}
