//! Health types shared by the storage layer and the HTTP surface.

use serde::{Deserialize, Serialize};

/// Readiness of a networked cache backend.
///
/// Transitions: `Unknown -> Ready | Degraded` on connect, `Ready -> Degraded`
/// on the first operation error, `Degraded -> Ready` when a health probe
/// succeeds. A store without a networked backend stays `Degraded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreHealth {
    /// Not yet probed
    #[default]
    Unknown,
    /// Networked backend is serving operations
    Ready,
    /// Operations are served by the in-process fallback
    Degraded,
}

impl StoreHealth {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Health status for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl From<StoreHealth> for HealthStatus {
    fn from(health: StoreHealth) -> Self {
        match health {
            StoreHealth::Ready => Self::Healthy,
            StoreHealth::Degraded | StoreHealth::Unknown => Self::Degraded,
        }
    }
}

/// Result of checking one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub component: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<i64>,
}

impl ComponentHealth {
    pub fn new(component: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            component: component.into(),
            status,
            message: None,
            response_time_ms: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_response_time(mut self, ms: i64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }
}
