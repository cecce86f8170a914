//! Executes a claimed rule's action against the platform.
//!
//! The dispatcher never raises: every platform failure becomes a FAILED
//! [`DispatchOutcome`] that the scheduler records on the rule. Targets that
//! are already in the requested state resolve DONE, so re-running a
//! dispatch is harmless.

use std::sync::Arc;

use serde::Serialize;

use snoozer_core::{Rule, RuleAction, RuleStatus};
use snoozer_platform::{Ack, DeploymentStatus, PlatformClient, PlatformError};

/// What the dispatcher did (or found) on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "detail", rename_all = "snake_case")]
pub enum DispatchDetail {
    Stopped { deployment_id: String },
    /// The latest deployment was already stopped; no stop call was needed,
    /// or the platform reported it as such.
    AlreadyStopped {
        deployment_id: String,
        status: Option<DeploymentStatus>,
    },
    Deleted,
    AlreadyDeleted,
    /// Dispatch failed; `kind` is the error class (`transport`,
    /// `unauthorized`, `rejected`, `not_found`, `decode`, `config`).
    Error { kind: &'static str },
}

/// Result of one dispatch. `status` is DONE or FAILED, never PENDING.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub status: RuleStatus,
    pub error: Option<String>,
    pub detail: DispatchDetail,
}

impl DispatchOutcome {
    fn done(detail: DispatchDetail) -> Self {
        Self {
            status: RuleStatus::Done,
            error: None,
            detail,
        }
    }

    fn failed(kind: &'static str, error: impl Into<String>) -> Self {
        Self {
            status: RuleStatus::Failed,
            error: Some(error.into()),
            detail: DispatchDetail::Error { kind },
        }
    }

    fn from_platform_error(e: &PlatformError) -> Self {
        Self::failed(e.kind(), e.to_string())
    }

    pub fn is_done(&self) -> bool {
        self.status == RuleStatus::Done
    }
}

/// Maps rule actions onto platform calls.
#[derive(Clone)]
pub struct ActionDispatcher {
    client: Arc<dyn PlatformClient>,
    /// Environment used for rules that do not name one.
    default_environment: Option<String>,
}

impl ActionDispatcher {
    pub fn new(client: Arc<dyn PlatformClient>, default_environment: Option<String>) -> Self {
        Self {
            client,
            default_environment,
        }
    }

    pub fn client(&self) -> &Arc<dyn PlatformClient> {
        &self.client
    }

    /// Dispatch `rule`'s action.
    pub async fn dispatch(&self, rule: &Rule) -> DispatchOutcome {
        let start = std::time::Instant::now();
        let outcome = match rule.action {
            RuleAction::Stop => self.stop(rule).await,
            RuleAction::Delete => self.delete(rule).await,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome.status {
            RuleStatus::Done => tracing::info!(
                rule_id = %rule.id,
                action = %rule.action,
                service_id = %rule.service_id,
                platform = self.client.platform_name(),
                detail = ?outcome.detail,
                duration_ms,
                "Rule action dispatched"
            ),
            _ => tracing::warn!(
                rule_id = %rule.id,
                action = %rule.action,
                service_id = %rule.service_id,
                platform = self.client.platform_name(),
                error = outcome.error.as_deref().unwrap_or(""),
                duration_ms,
                "Rule action failed"
            ),
        }
        outcome
    }

    async fn stop(&self, rule: &Rule) -> DispatchOutcome {
        let Some(environment_id) = rule
            .environment_id
            .as_deref()
            .or(self.default_environment.as_deref())
        else {
            return DispatchOutcome::failed("config", "environment not configured");
        };

        let status = match self
            .client
            .get_service_status(environment_id, &rule.service_id)
            .await
        {
            Ok(s) => s,
            Err(e) => return DispatchOutcome::from_platform_error(&e),
        };

        let Some(deployment_id) = status.latest_deployment_id else {
            return DispatchOutcome::failed("not_found", "deployment not found");
        };

        if status.status.is_stopped() {
            tracing::debug!(
                rule_id = %rule.id,
                deployment_id = %deployment_id,
                status = %status.status,
                "Deployment already stopped, skipping stop call"
            );
            return DispatchOutcome::done(DispatchDetail::AlreadyStopped {
                deployment_id,
                status: Some(status.status),
            });
        }

        match self.client.stop_deployment(&deployment_id).await {
            Ok(Ack::Applied) => DispatchOutcome::done(DispatchDetail::Stopped { deployment_id }),
            Ok(Ack::AlreadyInTargetState) => {
                DispatchOutcome::done(DispatchDetail::AlreadyStopped {
                    deployment_id,
                    status: None,
                })
            }
            Err(e) => DispatchOutcome::from_platform_error(&e),
        }
    }

    async fn delete(&self, rule: &Rule) -> DispatchOutcome {
        match self.client.delete_service(&rule.service_id).await {
            Ok(Ack::Applied) => DispatchOutcome::done(DispatchDetail::Deleted),
            Ok(Ack::AlreadyInTargetState) | Err(PlatformError::NotFound(_)) => {
                DispatchOutcome::done(DispatchDetail::AlreadyDeleted)
            }
            Err(e) => DispatchOutcome::from_platform_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use snoozer_core::NewRule;
    use snoozer_platform::mock::MockPlatform;

    fn rule(action: RuleAction, service: &str, env: Option<&str>) -> Rule {
        Rule::new(
            NewRule {
                service_id: service.to_string(),
                environment_id: env.map(String::from),
                action,
                execute_at: Utc::now(),
                note: None,
            },
            Utc::now(),
        )
    }

    fn dispatcher(mock: &Arc<MockPlatform>, env: Option<&str>) -> ActionDispatcher {
        let client: Arc<dyn PlatformClient> = mock.clone();
        ActionDispatcher::new(client, env.map(String::from))
    }

    #[tokio::test]
    async fn stop_stops_latest_deployment() {
        let mock = Arc::new(MockPlatform::new());
        mock.add_service("svc-1", "api", Some(("dep-1", DeploymentStatus::Success)));

        let outcome = dispatcher(&mock, Some("env-1"))
            .dispatch(&rule(RuleAction::Stop, "svc-1", None))
            .await;

        assert!(outcome.is_done());
        assert_eq!(
            outcome.detail,
            DispatchDetail::Stopped {
                deployment_id: "dep-1".into()
            }
        );
        assert_eq!(mock.stopped_deployments(), vec!["dep-1".to_string()]);
    }

    #[tokio::test]
    async fn stop_skips_call_when_already_stopped() {
        let mock = Arc::new(MockPlatform::new());
        mock.add_service("svc-1", "api", Some(("dep-1", DeploymentStatus::Removed)));

        let outcome = dispatcher(&mock, Some("env-1"))
            .dispatch(&rule(RuleAction::Stop, "svc-1", None))
            .await;

        assert!(outcome.is_done());
        assert_eq!(mock.stop_calls(), 0);
    }

    #[tokio::test]
    async fn stop_without_environment_fails() {
        let mock = Arc::new(MockPlatform::new());
        mock.add_service("svc-1", "api", Some(("dep-1", DeploymentStatus::Success)));

        let outcome = dispatcher(&mock, None)
            .dispatch(&rule(RuleAction::Stop, "svc-1", None))
            .await;

        assert_eq!(outcome.status, RuleStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("environment not configured"));
        assert_eq!(mock.status_calls(), 0);
    }

    #[tokio::test]
    async fn rule_environment_overrides_default() {
        let mock = Arc::new(MockPlatform::new());
        mock.add_service("svc-1", "api", Some(("dep-1", DeploymentStatus::Success)));

        let outcome = dispatcher(&mock, None)
            .dispatch(&rule(RuleAction::Stop, "svc-1", Some("env-9")))
            .await;
        assert!(outcome.is_done());
    }

    #[tokio::test]
    async fn stop_without_deployment_fails() {
        let mock = Arc::new(MockPlatform::new());
        mock.add_service("svc-1", "api", None);

        let outcome = dispatcher(&mock, Some("env-1"))
            .dispatch(&rule(RuleAction::Stop, "svc-1", None))
            .await;

        assert_eq!(outcome.status, RuleStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("deployment not found"));
    }

    #[tokio::test]
    async fn platform_error_becomes_failed_outcome() {
        let mock = Arc::new(MockPlatform::new());
        mock.add_service("svc-1", "api", Some(("dep-1", DeploymentStatus::Success)));
        mock.fail_next_stop(PlatformError::Unauthorized("bad token".into()));

        let outcome = dispatcher(&mock, Some("env-1"))
            .dispatch(&rule(RuleAction::Stop, "svc-1", None))
            .await;

        assert_eq!(outcome.status, RuleStatus::Failed);
        assert_eq!(outcome.detail, DispatchDetail::Error { kind: "unauthorized" });
        assert!(outcome.error.unwrap().contains("bad token"));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let mock = Arc::new(MockPlatform::new());
        mock.add_service("svc-1", "api", None);
        let d = dispatcher(&mock, None);
        let r = rule(RuleAction::Delete, "svc-1", None);

        let first = d.dispatch(&r).await;
        let second = d.dispatch(&r).await;

        assert_eq!(first.detail, DispatchDetail::Deleted);
        assert_eq!(second.detail, DispatchDetail::AlreadyDeleted);
        assert!(second.is_done());
        assert_eq!(mock.deleted_services(), vec!["svc-1".to_string()]);
    }

    #[tokio::test]
    async fn delete_transport_error_fails() {
        let mock = Arc::new(MockPlatform::new());
        mock.add_service("svc-1", "api", None);
        mock.fail_next_delete(PlatformError::Transport("connection reset".into()));

        let outcome = dispatcher(&mock, None)
            .dispatch(&rule(RuleAction::Delete, "svc-1", None))
            .await;
        assert_eq!(outcome.status, RuleStatus::Failed);
        assert!(mock.has_service("svc-1"));
    }
}
