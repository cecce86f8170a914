use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use super::outcome::ConvergenceOutcome;

/// Owner's handle on a running poller.
///
/// Dropping the handle cancels the poller, so a poller nobody holds cannot
/// keep ticking.
#[derive(Debug)]
pub struct PollerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<ConvergenceOutcome>>,
}

impl PollerHandle {
    pub(crate) fn new(cancel: CancellationToken, task: JoinHandle<ConvergenceOutcome>) -> Self {
        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Request cancellation. Idempotent and non-blocking.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the poller to settle.
    pub async fn outcome(mut self) -> ConvergenceOutcome {
        let Some(task) = self.task.take() else {
            return aborted();
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "convergence poller task failed");
                aborted()
            }
        }
    }

    /// Cancel, then wait. No status query is issued after this returns.
    pub async fn shutdown(self) -> ConvergenceOutcome {
        self.cancel();
        self.outcome().await
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn aborted() -> ConvergenceOutcome {
    ConvergenceOutcome::Cancelled {
        last_status: None,
        attempts: 0,
        history: Vec::new(),
    }
}
