//! GraphQL documents and response shapes for the Railway public API.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::status::DeploymentStatus;
use crate::traits::{PlatformError, ServiceSummary};

pub(crate) const SERVICES_QUERY: &str = r#"
query Services($environmentId: String!) {
  environment(id: $environmentId) {
    id
    serviceInstances {
      edges {
        node {
          serviceId
          serviceName
          latestDeployment {
            id
            status
            createdAt
          }
        }
      }
    }
  }
}"#;

pub(crate) const SERVICE_CREATE_MUTATION: &str = r#"
mutation CreateServiceMutation($input: ServiceCreateInput!) {
  serviceCreate(input: $input) {
    id
    name
    projectId
  }
}"#;

pub(crate) const SERVICE_DEPLOY_MUTATION: &str = r#"
mutation DeployServiceMutation($serviceId: String!, $environmentId: String!, $commitSha: String) {
  serviceInstanceDeployV2(commitSha: $commitSha, serviceId: $serviceId, environmentId: $environmentId)
}"#;

pub(crate) const DEPLOYMENT_STOP_MUTATION: &str = r#"
mutation DeploymentStopMutation($deploymentId: String!) {
  deploymentStop(id: $deploymentId)
}"#;

pub(crate) const SERVICE_DELETE_MUTATION: &str = r#"
mutation ServiceDeleteMutation($serviceId: String!) {
  serviceDelete(id: $serviceId)
}"#;

// ── Envelope ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}

impl<T> GraphQlResponse<T> {
    /// Unwrap `data`, turning an `errors` array into a [`PlatformError`].
    pub(crate) fn into_result(self) -> Result<T, PlatformError> {
        if !self.errors.is_empty() {
            let joined = self
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(classify_error_message(&joined));
        }
        self.data
            .ok_or_else(|| PlatformError::Rejected("no data returned from GraphQL query".to_string()))
    }
}

/// Map a GraphQL error message onto the error taxonomy.
pub(crate) fn classify_error_message(message: &str) -> PlatformError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("not authorized") || lower.contains("unauthorized") || lower.contains("forbidden") {
        PlatformError::Unauthorized(message.to_string())
    } else if lower.contains("not found") || lower.contains("does not exist") {
        PlatformError::NotFound(message.to_string())
    } else {
        PlatformError::Rejected(message.to_string())
    }
}

/// Whether a rejection says the stop/delete target is already gone.
pub(crate) fn is_already_applied(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("already")
        && ["stopped", "removed", "deleted", "inactive", "sleeping"]
            .iter()
            .any(|w| lower.contains(w))
}

// ── Payloads ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct ServicesData {
    pub environment: Option<Environment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Environment {
    pub service_instances: Connection<ServiceInstance>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Connection<T> {
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServiceInstance {
    pub service_id: String,
    pub service_name: String,
    pub latest_deployment: Option<LatestDeployment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LatestDeployment {
    pub id: String,
    pub status: DeploymentStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ServiceInstance> for ServiceSummary {
    fn from(node: ServiceInstance) -> Self {
        let (status, latest_deployment_id, last_deploy_time) = match node.latest_deployment {
            Some(d) => (d.status, Some(d.id), d.created_at),
            None => (DeploymentStatus::Unknown, None, None),
        };
        Self {
            id: node.service_id,
            name: node.service_name,
            status,
            latest_deployment_id,
            last_deploy_time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServiceCreateData {
    pub service_create: CreatedService,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatedService {
    pub id: String,
    pub name: String,
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServiceDeployData {
    pub service_instance_deploy_v2: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeploymentStopData {
    pub deployment_stop: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServiceDeleteData {
    pub service_delete: bool,
}
