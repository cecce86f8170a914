//! PlatformClient trait definition and shared error/value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::DeploymentStatus;

/// Errors returned by platform calls.
///
/// The engine treats every variant as a dispatch failure; the distinction is
/// kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rejected by platform: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("could not decode platform response: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Unauthorized(_) => "unauthorized",
            Self::Rejected(_) => "rejected",
            Self::NotFound(_) => "not_found",
            Self::Decode(_) => "decode",
        }
    }
}

/// Acknowledgement of a stop or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ack {
    /// The platform performed the operation.
    Applied,
    /// The target was already stopped or deleted.
    AlreadyInTargetState,
}

/// Where a new service pulls its code from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceSource {
    /// GitHub repository in `owner/name` form.
    Repo(String),
    /// Docker image reference.
    Image(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCreateInput {
    pub name: String,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    pub source: ServiceSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHandle {
    pub id: String,
    pub name: String,
    pub project_id: String,
}

/// Current state of a service within an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub service_id: String,
    /// Status of the latest deployment, or `UNKNOWN` if there is none.
    pub status: DeploymentStatus,
    pub latest_deployment_id: Option<String>,
    pub last_deploy_time: Option<DateTime<Utc>>,
}

/// One row of an environment's service listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub id: String,
    pub name: String,
    pub status: DeploymentStatus,
    pub latest_deployment_id: Option<String>,
    pub last_deploy_time: Option<DateTime<Utc>>,
}

impl From<&ServiceSummary> for ServiceStatus {
    fn from(s: &ServiceSummary) -> Self {
        Self {
            service_id: s.id.clone(),
            status: s.status.clone(),
            latest_deployment_id: s.latest_deployment_id.clone(),
            last_deploy_time: s.last_deploy_time,
        }
    }
}

/// Remote operations on services and deployments.
///
/// Implementations are stateless from the caller's point of view: nothing
/// about remote state is cached between calls.
#[async_trait::async_trait]
pub trait PlatformClient: Send + Sync {
    async fn create_service(&self, input: &ServiceCreateInput)
        -> Result<ServiceHandle, PlatformError>;

    /// Trigger a deployment and return its id.
    async fn deploy_service(
        &self,
        service_id: &str,
        environment_id: &str,
    ) -> Result<String, PlatformError>;

    async fn stop_deployment(&self, deployment_id: &str) -> Result<Ack, PlatformError>;

    async fn delete_service(&self, service_id: &str) -> Result<Ack, PlatformError>;

    /// Status of one service. `NotFound` if the environment or the service
    /// does not exist.
    async fn get_service_status(
        &self,
        environment_id: &str,
        service_id: &str,
    ) -> Result<ServiceStatus, PlatformError>;

    async fn list_services(&self, environment_id: &str)
        -> Result<Vec<ServiceSummary>, PlatformError>;

    /// Human-readable name for logs (e.g., "railway").
    fn platform_name(&self) -> &str;
}
