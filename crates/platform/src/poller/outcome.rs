use std::time::Duration;

use serde::Serialize;

use snoozer_core::config::PollerSettings;

use crate::status::DeploymentStatus;

/// Number of observations kept in a poller's status history.
pub const HISTORY_LEN: usize = 8;

/// What a poller watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceTarget {
    pub service_id: String,
    pub environment_id: String,
    /// Deployment the caller triggered, if known. The status query is per
    /// service, so answers about any other deployment are not counted as
    /// progress.
    pub deployment_id: Option<String>,
}

impl ConvergenceTarget {
    pub fn new(service_id: impl Into<String>, environment_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            environment_id: environment_id.into(),
            deployment_id: None,
        }
    }

    pub fn with_deployment(mut self, deployment_id: impl Into<String>) -> Self {
        self.deployment_id = Some(deployment_id.into());
        self
    }

    /// Whether a status reporting `latest` as the service's newest deployment
    /// describes the deployment being watched.
    pub fn observes(&self, latest: Option<&str>) -> bool {
        match &self.deployment_id {
            Some(expected) => latest == Some(expected.as_str()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(10),
        }
    }
}

impl From<&PollerSettings> for PollerConfig {
    fn from(settings: &PollerSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            interval: settings.interval(),
        }
    }
}

/// How a poller finished. None of these is an error: a timeout only means
/// the caller must not assume convergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConvergenceOutcome {
    Converged {
        status: DeploymentStatus,
        attempts: u32,
        history: Vec<DeploymentStatus>,
    },
    TimedOut {
        last_status: Option<DeploymentStatus>,
        attempts: u32,
        history: Vec<DeploymentStatus>,
    },
    Cancelled {
        last_status: Option<DeploymentStatus>,
        attempts: u32,
        history: Vec<DeploymentStatus>,
    },
}

impl ConvergenceOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    /// Status queries made, failed ones included.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Converged { attempts, .. }
            | Self::TimedOut { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Last status observed, terminal or not.
    pub fn last_status(&self) -> Option<&DeploymentStatus> {
        match self {
            Self::Converged { status, .. } => Some(status),
            Self::TimedOut { last_status, .. } | Self::Cancelled { last_status, .. } => {
                last_status.as_ref()
            }
        }
    }

    /// Up to [`HISTORY_LEN`] most recent observations, oldest first.
    pub fn history(&self) -> &[DeploymentStatus] {
        match self {
            Self::Converged { history, .. }
            | Self::TimedOut { history, .. }
            | Self::Cancelled { history, .. } => history,
        }
    }

    /// One-line description for operators.
    pub fn describe(&self) -> String {
        match self {
            Self::Converged { status, attempts, .. } => {
                format!("deployment reached {status} after {attempts} checks")
            }
            Self::TimedOut { last_status, attempts, .. } => format!(
                "timed out after {attempts} checks, last known status = {}",
                last_status
                    .as_ref()
                    .map(DeploymentStatus::as_str)
                    .unwrap_or("UNKNOWN")
            ),
            Self::Cancelled { attempts, .. } => format!("cancelled after {attempts} checks"),
        }
    }
}
