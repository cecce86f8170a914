//! Persistent storage for [`Rule`]s.
//!
//! The store is the only shared mutable state in the engine. Every
//! transition out of PENDING goes through a conditional write:
//! [`RuleStore::try_claim`] marks a rule as owned by one executor, and
//! [`RuleStore::complete`] / [`RuleStore::release`] only apply while the
//! caller still holds that claim.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use snoozer_core::{NewRule, Result, Rule, RuleStatus, RuleUpdate};

mod memory;
mod postgres;

#[cfg(test)]
mod tests;

pub use memory::InMemoryRuleStore;
pub use postgres::PgRuleStore;

/// Final result of a dispatch, as written by [`RuleStore::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    Done,
    Failed(String),
}

impl TerminalOutcome {
    pub fn status(&self) -> RuleStatus {
        match self {
            Self::Done => RuleStatus::Done,
            Self::Failed(_) => RuleStatus::Failed,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Done => None,
            Self::Failed(e) => Some(e),
        }
    }
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn insert(&self, rule: NewRule) -> Result<Rule>;

    async fn get(&self, id: Uuid) -> Result<Option<Rule>>;

    /// All rules, oldest first.
    async fn list(&self) -> Result<Vec<Rule>>;

    /// Operator edit. `NotFound` when absent, `RuleNotPending` when the rule
    /// already reached DONE or FAILED.
    async fn update(&self, id: Uuid, update: RuleUpdate) -> Result<Rule>;

    /// Remove a rule in any status. Returns whether it existed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// PENDING, unclaimed rules with `execute_at <= now`, earliest first.
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Rule>>;

    /// Atomically claim a rule whose status equals `expected`, which
    /// carries no claim and whose `execute_at <= now`. Returns the claimed rule (with its fresh
    /// `claim_token`), or `None` without side effects when another executor
    /// got there first or the status moved on.
    async fn try_claim(
        &self,
        id: Uuid,
        expected: RuleStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Rule>>;

    /// Write the terminal status of a claimed rule. Applies only while the
    /// rule is PENDING and `claim_token` still matches.
    async fn complete(
        &self,
        id: Uuid,
        claim_token: Uuid,
        outcome: TerminalOutcome,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Give a claimed rule back for another attempt on a later tick. Same
    /// token condition as [`complete`](Self::complete).
    async fn release(
        &self,
        id: Uuid,
        claim_token: Uuid,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Clear claims taken before `older_than` on rules that are still
    /// PENDING, stamping `updated_at = now`. Returns the ids put back in the
    /// queue.
    async fn requeue_stale_claims(
        &self,
        older_than: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>>;

    /// Human-readable backend name for logs.
    fn backend_name(&self) -> &str;
}
