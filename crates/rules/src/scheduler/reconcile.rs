use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::store::RuleStore;

/// Re-queues rules whose claim outlived `claim_grace`.
///
/// A claim is left behind when an executor dies between claiming and the
/// terminal write, or when that write fails. Clearing it makes the rule due
/// again; the old executor's token no longer matches, so it cannot write a
/// terminal status afterwards.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RuleStore>,
    claim_grace: Duration,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RuleStore>, claim_grace: Duration) -> Self {
        Self { store, claim_grace }
    }

    /// Sweep once. Returns how many rules were re-queued.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let grace = chrono::Duration::from_std(self.claim_grace)
            .unwrap_or_else(|_| chrono::Duration::minutes(10));
        match self.store.requeue_stale_claims(now - grace, now).await {
            Ok(ids) => {
                for id in &ids {
                    warn!(rule_id = %id, "re-queued rule with stale claim");
                }
                if !ids.is_empty() {
                    info!(count = ids.len(), "stale claim sweep finished");
                }
                ids.len()
            }
            Err(e) => {
                warn!(error = %e, "stale claim sweep failed");
                0
            }
        }
    }
}
