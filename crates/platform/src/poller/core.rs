use std::collections::VecDeque;
use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::status::DeploymentStatus;
use crate::traits::PlatformClient;

use super::handle::PollerHandle;
use super::outcome::{ConvergenceOutcome, ConvergenceTarget, PollerConfig, HISTORY_LEN};

/// Callback run once when a poller converges or times out.
pub type OnSettled = Box<dyn FnOnce(&ConvergenceOutcome) + Send + 'static>;

/// Watches one deployment until it reaches a terminal status, the attempt
/// budget runs out, or the owner cancels.
pub struct ConvergencePoller {
    client: Arc<dyn PlatformClient>,
    target: ConvergenceTarget,
    config: PollerConfig,
    on_settled: Option<OnSettled>,
}

impl ConvergencePoller {
    /// Start polling on the current tokio runtime.
    pub fn spawn(
        client: Arc<dyn PlatformClient>,
        target: ConvergenceTarget,
        config: PollerConfig,
    ) -> PollerHandle {
        Self::spawn_with(client, target, config, None)
    }

    /// Like [`spawn`](Self::spawn), with a callback for the converged and
    /// timed-out outcomes. A cancelled poller does not call it.
    pub fn spawn_with(
        client: Arc<dyn PlatformClient>,
        target: ConvergenceTarget,
        config: PollerConfig,
        on_settled: Option<OnSettled>,
    ) -> PollerHandle {
        let poller = Self {
            client,
            target,
            config,
            on_settled,
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poller.run(cancel.clone()));
        PollerHandle::new(cancel, task)
    }

    async fn run(mut self, cancel: CancellationToken) -> ConvergenceOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts = 0u32;
        let mut last_status: Option<DeploymentStatus> = None;
        let mut history: VecDeque<DeploymentStatus> = VecDeque::with_capacity(HISTORY_LEN);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    break cancelled(last_status, attempts, history);
                }
                _ = ticker.tick() => {}
            }

            attempts += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    break cancelled(last_status, attempts, history);
                }
                r = self.client.get_service_status(
                    &self.target.environment_id,
                    &self.target.service_id,
                ) => r,
            };

            match result {
                Ok(status) if !self.target.observes(status.latest_deployment_id.as_deref()) => {
                    debug!(
                        service_id = %self.target.service_id,
                        deployment_id = self.target.deployment_id.as_deref().unwrap_or("-"),
                        latest_deployment_id = status.latest_deployment_id.as_deref().unwrap_or("-"),
                        attempt = attempts,
                        "status belongs to another deployment, waiting"
                    );
                }
                Ok(status) => {
                    debug!(
                        service_id = %self.target.service_id,
                        deployment_id = self.target.deployment_id.as_deref().unwrap_or("-"),
                        attempt = attempts,
                        status = %status.status,
                        "deployment status"
                    );
                    if history.len() == HISTORY_LEN {
                        history.pop_front();
                    }
                    history.push_back(status.status.clone());
                    if status.status.is_terminal() {
                        break ConvergenceOutcome::Converged {
                            status: status.status,
                            attempts,
                            history: history.into(),
                        };
                    }
                    last_status = Some(status.status);
                }
                Err(e) => {
                    warn!(
                        service_id = %self.target.service_id,
                        attempt = attempts,
                        error = %e,
                        "status query failed"
                    );
                }
            }

            if attempts >= max_attempts {
                break ConvergenceOutcome::TimedOut {
                    last_status,
                    attempts,
                    history: history.into(),
                };
            }
        };

        info!(
            service_id = %self.target.service_id,
            attempts = outcome.attempts(),
            "{}",
            outcome.describe()
        );

        if !matches!(outcome, ConvergenceOutcome::Cancelled { .. }) {
            if let Some(callback) = self.on_settled.take() {
                callback(&outcome);
            }
        }
        outcome
    }
}

fn cancelled(
    last_status: Option<DeploymentStatus>,
    attempts: u32,
    history: VecDeque<DeploymentStatus>,
) -> ConvergenceOutcome {
    ConvergenceOutcome::Cancelled {
        last_status,
        attempts,
        history: history.into(),
    }
}
