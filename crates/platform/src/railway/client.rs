//! [`RailwayClient`]: `PlatformClient` over the Railway GraphQL API.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use snoozer_core::config::RailwayConfig;

use crate::traits::{
    Ack, PlatformClient, PlatformError, ServiceCreateInput, ServiceHandle, ServiceSource,
    ServiceStatus, ServiceSummary,
};

use super::graphql::{
    is_already_applied, DeploymentStopData, GraphQlResponse, ServiceCreateData,
    ServiceDeleteData, ServiceDeployData, ServicesData, DEPLOYMENT_STOP_MUTATION,
    SERVICES_QUERY, SERVICE_CREATE_MUTATION, SERVICE_DELETE_MUTATION, SERVICE_DEPLOY_MUTATION,
};

/// Talks to `backboard.railway.com` with a bearer token.
///
/// A missing token is not a construction error: every call then fails with
/// [`PlatformError::Unauthorized`], which the engine records on the rule.
#[derive(Debug, Clone)]
pub struct RailwayClient {
    api_url: String,
    token: Option<String>,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl RailwayClient {
    pub fn new(config: &RailwayConfig) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PlatformError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_url: config.api_url.clone(),
            token: config.api_token.clone(),
            client,
        })
    }

    /// POST one GraphQL document and decode its `data`.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, PlatformError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| PlatformError::Unauthorized("RAILWAY_API_TOKEN is not configured".to_string()))?;

        debug!(operation, "railway request");
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PlatformError::Unauthorized(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            warn!(operation, %status, body = %body, "railway returned non-2xx status");
            return Err(PlatformError::Transport(format!("HTTP {status}")));
        }

        let envelope: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;
        envelope.into_result()
    }

    /// Run a stop/delete mutation, folding "already stopped" style
    /// rejections into [`Ack::AlreadyInTargetState`].
    async fn execute_idempotent<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
        applied: impl FnOnce(T) -> bool,
    ) -> Result<Ack, PlatformError> {
        let result = self.execute::<T>(operation, query, variables).await;
        fold_ack(operation, result, applied)
    }
}

/// Turn a mutation result into an [`Ack`]: a `false` payload is a
/// rejection, an "already stopped/removed" rejection is success.
pub(crate) fn fold_ack<T>(
    operation: &str,
    result: Result<T, PlatformError>,
    applied: impl FnOnce(T) -> bool,
) -> Result<Ack, PlatformError> {
    match result {
        Ok(data) => {
            if applied(data) {
                Ok(Ack::Applied)
            } else {
                Err(PlatformError::Rejected(format!("{operation} returned false")))
            }
        }
        Err(PlatformError::Rejected(msg)) if is_already_applied(&msg) => {
            Ok(Ack::AlreadyInTargetState)
        }
        Err(e) => Err(e),
    }
}

pub(crate) fn create_input_json(input: &ServiceCreateInput) -> Value {
    let source = match &input.source {
        ServiceSource::Repo(repo) => json!({ "repo": repo }),
        ServiceSource::Image(image) => json!({ "image": image }),
    };
    let mut value = json!({
        "name": input.name,
        "projectId": input.project_id,
        "source": source,
    });
    if let Some(ref env) = input.environment_id {
        value["environmentId"] = json!(env);
    }
    value
}

#[async_trait::async_trait]
impl PlatformClient for RailwayClient {
    async fn create_service(
        &self,
        input: &ServiceCreateInput,
    ) -> Result<ServiceHandle, PlatformError> {
        let data: ServiceCreateData = self
            .execute(
                "serviceCreate",
                SERVICE_CREATE_MUTATION,
                json!({ "input": create_input_json(input) }),
            )
            .await?;
        let created = data.service_create;
        Ok(ServiceHandle {
            id: created.id,
            name: created.name,
            project_id: created.project_id,
        })
    }

    async fn deploy_service(
        &self,
        service_id: &str,
        environment_id: &str,
    ) -> Result<String, PlatformError> {
        let data: ServiceDeployData = self
            .execute(
                "serviceInstanceDeployV2",
                SERVICE_DEPLOY_MUTATION,
                json!({ "serviceId": service_id, "environmentId": environment_id }),
            )
            .await?;
        Ok(data.service_instance_deploy_v2)
    }

    async fn stop_deployment(&self, deployment_id: &str) -> Result<Ack, PlatformError> {
        self.execute_idempotent(
            "deploymentStop",
            DEPLOYMENT_STOP_MUTATION,
            json!({ "deploymentId": deployment_id }),
            |d: DeploymentStopData| d.deployment_stop,
        )
        .await
    }

    async fn delete_service(&self, service_id: &str) -> Result<Ack, PlatformError> {
        self.execute_idempotent(
            "serviceDelete",
            SERVICE_DELETE_MUTATION,
            json!({ "serviceId": service_id }),
            |d: ServiceDeleteData| d.service_delete,
        )
        .await
    }

    async fn get_service_status(
        &self,
        environment_id: &str,
        service_id: &str,
    ) -> Result<ServiceStatus, PlatformError> {
        let services = self.list_services(environment_id).await?;
        services
            .iter()
            .find(|s| s.id == service_id)
            .map(ServiceStatus::from)
            .ok_or_else(|| {
                PlatformError::NotFound(format!(
                    "service {service_id} in environment {environment_id}"
                ))
            })
    }

    async fn list_services(
        &self,
        environment_id: &str,
    ) -> Result<Vec<ServiceSummary>, PlatformError> {
        let data: ServicesData = self
            .execute(
                "environment.serviceInstances",
                SERVICES_QUERY,
                json!({ "environmentId": environment_id }),
            )
            .await?;
        let environment = data
            .environment
            .ok_or_else(|| PlatformError::NotFound(format!("environment {environment_id}")))?;
        Ok(environment
            .service_instances
            .edges
            .into_iter()
            .map(|edge| ServiceSummary::from(edge.node))
            .collect())
    }

    fn platform_name(&self) -> &str {
        "railway"
    }
}
