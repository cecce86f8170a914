//! Spin-up of a new service with an optional auto-shutdown TTL.
//!
//! The TTL is not tracked by anything special: it becomes an ordinary STOP
//! rule that the scheduler executes like any other.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use snoozer_core::{
    validate_service_name, NewRule, Rule, RuleAction, SnoozerError, Ttl, ValidationError,
};
use snoozer_platform::{
    ConvergencePoller, ConvergenceTarget, PlatformClient, PlatformError, PollerConfig,
    PollerHandle, ServiceCreateInput, ServiceHandle, ServiceSource,
};

use crate::store::RuleStore;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("platform call failed: {0}")]
    Platform(#[from] PlatformError),

    /// The service was created and deployed but the shutdown rule could not
    /// be stored.
    #[error("service {service_id} is running but its shutdown rule was not saved: {source}")]
    ShutdownRule {
        service_id: String,
        #[source]
        source: SnoozerError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinUpRequest {
    pub name: String,
    pub project_id: String,
    pub environment_id: String,
    pub source: ServiceSource,
    pub ttl: Option<Ttl>,
}

/// A freshly created service and the work attached to it.
#[derive(Debug)]
pub struct SpinUp {
    pub service: ServiceHandle,
    pub deployment_id: String,
    pub shutdown_rule: Option<Rule>,
    /// Watches the new deployment; dropping it stops the watch.
    pub poller: PollerHandle,
}

pub struct Provisioner {
    client: Arc<dyn PlatformClient>,
    store: Arc<dyn RuleStore>,
    poller_config: PollerConfig,
}

impl Provisioner {
    pub fn new(
        client: Arc<dyn PlatformClient>,
        store: Arc<dyn RuleStore>,
        poller_config: PollerConfig,
    ) -> Self {
        Self {
            client,
            store,
            poller_config,
        }
    }

    /// Create, deploy, schedule the shutdown (if a TTL is given) and start
    /// watching the deployment.
    pub async fn spin_up(&self, request: SpinUpRequest) -> Result<SpinUp, ProvisionError> {
        validate_service_name(&request.name)?;

        let service = self
            .client
            .create_service(&ServiceCreateInput {
                name: request.name.clone(),
                project_id: request.project_id.clone(),
                environment_id: Some(request.environment_id.clone()),
                source: request.source.clone(),
            })
            .await?;
        info!(service_id = %service.id, name = %service.name, "service created");

        let deployment_id = self
            .client
            .deploy_service(&service.id, &request.environment_id)
            .await?;
        info!(service_id = %service.id, deployment_id = %deployment_id, "deployment triggered");

        let shutdown_rule = match request.ttl {
            Some(ttl) => {
                let rule = self
                    .store
                    .insert(NewRule {
                        service_id: service.id.clone(),
                        environment_id: Some(request.environment_id.clone()),
                        action: RuleAction::Stop,
                        execute_at: Utc::now() + ttl.duration(),
                        note: Some(format!("auto-shutdown after {ttl}")),
                    })
                    .await
                    .map_err(|source| {
                        warn!(service_id = %service.id, error = %source, "failed to save shutdown rule");
                        ProvisionError::ShutdownRule {
                            service_id: service.id.clone(),
                            source,
                        }
                    })?;
                info!(
                    service_id = %service.id,
                    rule_id = %rule.id,
                    execute_at = %rule.execute_at,
                    "auto-shutdown scheduled"
                );
                Some(rule)
            }
            None => None,
        };

        let target = ConvergenceTarget::new(service.id.clone(), request.environment_id)
            .with_deployment(deployment_id.clone());
        let poller = ConvergencePoller::spawn(self.client.clone(), target, self.poller_config);

        Ok(SpinUp {
            service,
            deployment_id,
            shutdown_rule,
            poller,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRuleStore;
    use snoozer_core::RuleStatus;
    use snoozer_platform::mock::MockPlatform;
    use snoozer_platform::{ConvergenceOutcome, DeploymentStatus};
    use std::time::Duration;

    fn request(name: &str, ttl: Option<Ttl>) -> SpinUpRequest {
        SpinUpRequest {
            name: name.to_string(),
            project_id: "proj-1".into(),
            environment_id: "env-1".into(),
            source: ServiceSource::Image("nginx:latest".into()),
            ttl,
        }
    }

    fn provisioner(mock: &Arc<MockPlatform>, store: &Arc<InMemoryRuleStore>) -> Provisioner {
        let config = PollerConfig {
            max_attempts: 5,
            interval: Duration::from_secs(10),
        };
        Provisioner::new(mock.clone(), store.clone(), config)
    }

    #[tokio::test(start_paused = true)]
    async fn spin_up_schedules_shutdown_and_watches_deployment() {
        let mock = Arc::new(MockPlatform::new());
        let store = Arc::new(InMemoryRuleStore::new());

        // The mock names the first created service `svc-1`.
        mock.script_statuses("svc-1", vec![DeploymentStatus::Building, DeploymentStatus::Success]);

        let before = Utc::now();
        let spun = provisioner(&mock, &store)
            .spin_up(request("preview-42", Some(Ttl::SIX_HOURS)))
            .await
            .unwrap();

        assert_eq!(mock.create_calls(), 1);
        assert_eq!(mock.deploy_calls(), 1);
        assert_eq!(spun.service.id, "svc-1");
        assert_eq!(spun.service.name, "preview-42");

        let rule = spun.shutdown_rule.clone().unwrap();
        assert_eq!(rule.action, RuleAction::Stop);
        assert_eq!(rule.status, RuleStatus::Pending);
        assert_eq!(rule.service_id, spun.service.id);
        assert_eq!(rule.environment_id.as_deref(), Some("env-1"));
        assert_eq!(rule.note.as_deref(), Some("auto-shutdown after 6h"));
        assert!(rule.execute_at >= before + chrono::Duration::hours(6));
        assert_eq!(store.len().await, 1);

        let outcome = spun.poller.outcome().await;
        assert!(matches!(
            outcome,
            ConvergenceOutcome::Converged { status: DeploymentStatus::Success, attempts: 2, .. }
        ));
    }

    #[tokio::test]
    async fn no_ttl_means_no_rule() {
        let mock = Arc::new(MockPlatform::new());
        let store = Arc::new(InMemoryRuleStore::new());

        let spun = provisioner(&mock, &store)
            .spin_up(request("scratch", None))
            .await
            .unwrap();

        assert!(spun.shutdown_rule.is_none());
        assert!(store.is_empty().await);
        spun.poller.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_name_never_reaches_the_platform() {
        let mock = Arc::new(MockPlatform::new());
        let store = Arc::new(InMemoryRuleStore::new());

        let err = provisioner(&mock, &store)
            .spin_up(request("bad name!", Some(Ttl::ONE_HOUR)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Validation(ValidationError::InvalidServiceName { .. })
        ));
        assert_eq!(mock.create_calls(), 0);
        assert!(store.is_empty().await);
    }
}
