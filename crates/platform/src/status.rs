//! Remote deployment status as reported by the platform.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Deployment status. Unrecognised values are kept verbatim in
/// [`DeploymentStatus::Other`] and treated as still converging.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeploymentStatus {
    Queued,
    Initializing,
    Building,
    Deploying,
    Waiting,
    Success,
    Failed,
    Crashed,
    Removing,
    Removed,
    Sleeping,
    Skipped,
    /// The service has no deployment yet.
    Unknown,
    Other(String),
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "QUEUED",
            Self::Initializing => "INITIALIZING",
            Self::Building => "BUILDING",
            Self::Deploying => "DEPLOYING",
            Self::Waiting => "WAITING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Crashed => "CRASHED",
            Self::Removing => "REMOVING",
            Self::Removed => "REMOVED",
            Self::Sleeping => "SLEEPING",
            Self::Skipped => "SKIPPED",
            Self::Unknown => "UNKNOWN",
            Self::Other(s) => s,
        }
    }

    /// A deployment has converged once it reaches SUCCESS, FAILED or CRASHED.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Crashed)
    }

    /// The deployment is no longer running, so a stop would be a no-op.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Removing | Self::Removed | Self::Sleeping)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Self::Queued,
            "INITIALIZING" => Self::Initializing,
            "BUILDING" => Self::Building,
            "DEPLOYING" => Self::Deploying,
            "WAITING" => Self::Waiting,
            "SUCCESS" => Self::Success,
            "FAILED" => Self::Failed,
            "CRASHED" => Self::Crashed,
            "REMOVING" => Self::Removing,
            "REMOVED" => Self::Removed,
            "SLEEPING" => Self::Sleeping,
            "SKIPPED" => Self::Skipped,
            "UNKNOWN" | "" => Self::Unknown,
            _ => Self::Other(s.to_string()),
        })
    }
}

impl From<String> for DeploymentStatus {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl From<DeploymentStatus> for String {
    fn from(status: DeploymentStatus) -> Self {
        status.as_str().to_string()
    }
}
