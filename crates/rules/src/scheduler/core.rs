//! [`RuleScheduler`]: drives due rules through claim, dispatch and the
//! terminal write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use snoozer_core::{Rule, RuleStatus};

use crate::dispatcher::ActionDispatcher;
use crate::store::{RuleStore, TerminalOutcome};

use super::config::SchedulerConfig;
use super::reconcile::Reconciler;
use super::report::TickReport;

/// How a claimed rule left the tick.
enum Settled {
    Done,
    Failed,
    Retried,
    /// The terminal write errored or no longer owned the claim.
    Unrecorded,
}

/// Periodically claims and executes due rules.
///
/// Overlapping ticks and several scheduler processes are safe: a rule is
/// only dispatched by the executor whose `try_claim` succeeded.
pub struct RuleScheduler {
    store: Arc<dyn RuleStore>,
    dispatcher: ActionDispatcher,
    reconciler: Reconciler,
    config: SchedulerConfig,
}

impl RuleScheduler {
    pub fn new(
        store: Arc<dyn RuleStore>,
        dispatcher: ActionDispatcher,
        config: SchedulerConfig,
    ) -> Self {
        let reconciler = Reconciler::new(store.clone(), config.claim_grace);
        Self {
            store,
            dispatcher,
            reconciler,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run a single pass over the rules due at `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let due = match self.store.list_due(now).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(error = %e, "scheduler: failed to query due rules");
                return TickReport::store_failure();
            }
        };

        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };

        let mut claimed = Vec::with_capacity(due.len());
        for rule in due {
            // The claim re-checks eligibility; a rule edited since the scan
            // is simply not claimed.
            match self.store.try_claim(rule.id, RuleStatus::Pending, now).await {
                Ok(Some(rule)) => claimed.push(rule),
                Ok(None) => {
                    debug!(rule_id = %rule.id, "scheduler: rule claimed elsewhere or no longer due, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(rule_id = %rule.id, error = %e, "scheduler: claim failed");
                    report.store_errors += 1;
                }
            }
        }
        report.claimed = claimed.len();

        let limit = self.config.max_concurrent_dispatches.max(1);
        let settled: Vec<Settled> = stream::iter(claimed)
            .map(|rule| self.execute(rule))
            .buffer_unordered(limit)
            .collect()
            .await;

        for s in settled {
            match s {
                Settled::Done => report.done += 1,
                Settled::Failed => report.failed += 1,
                Settled::Retried => report.retried += 1,
                Settled::Unrecorded => report.store_errors += 1,
            }
        }
        report
    }

    /// Dispatch one claimed rule and persist what happened.
    async fn execute(&self, rule: Rule) -> Settled {
        let Some(token) = rule.claim_token else {
            error!(rule_id = %rule.id, "scheduler: claimed rule has no claim token");
            return Settled::Unrecorded;
        };

        let outcome = self.dispatcher.dispatch(&rule).await;
        let attempts = rule.attempts + 1;

        let (written, settled) = if outcome.is_done() {
            let written = self
                .store
                .complete(rule.id, token, TerminalOutcome::Done, Utc::now())
                .await;
            (written, Settled::Done)
        } else if self.config.retry.allows_retry(attempts) {
            info!(
                rule_id = %rule.id,
                attempts,
                max_attempts = self.config.retry.max_attempts,
                "scheduler: dispatch failed, releasing rule for retry"
            );
            let written = self
                .store
                .release(rule.id, token, outcome.error.clone(), Utc::now())
                .await;
            (written, Settled::Retried)
        } else {
            let error = outcome
                .error
                .clone()
                .unwrap_or_else(|| "dispatch failed".to_string());
            let written = self
                .store
                .complete(rule.id, token, TerminalOutcome::Failed(error), Utc::now())
                .await;
            (written, Settled::Failed)
        };

        match written {
            Ok(true) => settled,
            Ok(false) => {
                warn!(
                    rule_id = %rule.id,
                    "scheduler: claim was lost before the result could be recorded"
                );
                Settled::Unrecorded
            }
            Err(e) => {
                error!(
                    rule_id = %rule.id,
                    error = %e,
                    "scheduler: failed to record dispatch result, leaving it to reconciliation"
                );
                Settled::Unrecorded
            }
        }
    }

    /// Re-queue abandoned claims now.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> usize {
        self.reconciler.sweep(now).await
    }

    /// Tick until `cancel` fires. A tick in progress is finished first, so
    /// no claim is abandoned by shutdown.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            store = self.store.backend_name(),
            platform = self.dispatcher.client().platform_name(),
            tick_secs = self.config.tick_interval.as_secs(),
            max_concurrent = self.config.max_concurrent_dispatches,
            "rule scheduler started"
        );

        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let every = u64::from(self.config.reconcile_every_ticks);
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Sweep on the first tick too, to pick up claims left by a
            // previous process.
            if every > 0 && ticks % every == 0 {
                self.reconcile(Utc::now()).await;
            }
            ticks += 1;

            let report = self.tick(Utc::now()).await;
            if report.is_idle() {
                debug!("scheduler: nothing due");
            } else {
                info!(
                    due = report.due,
                    claimed = report.claimed,
                    skipped = report.skipped,
                    done = report.done,
                    failed = report.failed,
                    retried = report.retried,
                    store_errors = report.store_errors,
                    "scheduler tick complete"
                );
            }
        }

        info!("rule scheduler stopped");
    }

    /// Run on a background task.
    pub fn spawn(self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });
        SchedulerHandle { cancel, task }
    }
}

/// Owner's handle on a spawned scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop after the current tick and wait for the task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "scheduler task failed");
        }
    }
}
