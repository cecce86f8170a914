use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use snoozer_core::{NewRule, Result, Rule, RuleStatus, RuleUpdate, SnoozerError};

use super::{RuleStore, TerminalOutcome};

/// Process-local store. Each conditional operation runs under a single
/// lock acquisition, which is what makes `try_claim` atomic.
#[derive(Default)]
pub struct InMemoryRuleStore {
    rules: Mutex<HashMap<Uuid, Rule>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rules.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rules.lock().await.is_empty()
    }
}

fn owns_claim(rule: &Rule, claim_token: Uuid) -> bool {
    rule.status == RuleStatus::Pending && rule.claim_token == Some(claim_token)
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn insert(&self, rule: NewRule) -> Result<Rule> {
        let rule = Rule::new(rule, Utc::now());
        self.rules.lock().await.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Rule>> {
        Ok(self.rules.lock().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Rule>> {
        let mut rules: Vec<Rule> = self.rules.lock().await.values().cloned().collect();
        rules.sort_by_key(|r| (r.created_at, r.id));
        Ok(rules)
    }

    async fn update(&self, id: Uuid, update: RuleUpdate) -> Result<Rule> {
        let mut rules = self.rules.lock().await;
        let rule = rules
            .get_mut(&id)
            .ok_or_else(|| SnoozerError::rule_not_found(id))?;
        if rule.status.is_terminal() {
            return Err(SnoozerError::RuleNotPending(id));
        }
        if rule.is_claimed() {
            return Err(SnoozerError::RuleInFlight(id));
        }
        rule.apply_update(&update, Utc::now());
        Ok(rule.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.rules.lock().await.remove(&id).is_some())
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Rule>> {
        let mut due: Vec<Rule> = self
            .rules
            .lock()
            .await
            .values()
            .filter(|r| r.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|r| (r.execute_at, r.created_at));
        Ok(due)
    }

    async fn try_claim(
        &self,
        id: Uuid,
        expected: RuleStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Rule>> {
        let mut rules = self.rules.lock().await;
        let Some(rule) = rules.get_mut(&id) else {
            return Ok(None);
        };
        if rule.status != expected || rule.is_claimed() || rule.execute_at > now {
            return Ok(None);
        }
        rule.claimed_at = Some(now);
        rule.claim_token = Some(Uuid::new_v4());
        rule.updated_at = now;
        Ok(Some(rule.clone()))
    }

    async fn complete(
        &self,
        id: Uuid,
        claim_token: Uuid,
        outcome: TerminalOutcome,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut rules = self.rules.lock().await;
        let Some(rule) = rules.get_mut(&id) else {
            return Ok(false);
        };
        if !owns_claim(rule, claim_token) || !rule.status.can_transition_to(outcome.status()) {
            return Ok(false);
        }
        rule.status = outcome.status();
        rule.last_error = outcome.error().map(str::to_string);
        rule.executed_at = Some(now);
        rule.attempts += 1;
        rule.claimed_at = None;
        rule.claim_token = None;
        rule.updated_at = now;
        Ok(true)
    }

    async fn release(
        &self,
        id: Uuid,
        claim_token: Uuid,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut rules = self.rules.lock().await;
        let Some(rule) = rules.get_mut(&id) else {
            return Ok(false);
        };
        if !owns_claim(rule, claim_token) {
            return Ok(false);
        }
        rule.last_error = error;
        rule.attempts += 1;
        rule.claimed_at = None;
        rule.claim_token = None;
        rule.updated_at = now;
        Ok(true)
    }

    async fn requeue_stale_claims(
        &self,
        older_than: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>> {
        let mut rules = self.rules.lock().await;
        let mut requeued = Vec::new();
        for rule in rules.values_mut() {
            let stale = rule.status == RuleStatus::Pending
                && rule.claimed_at.is_some_and(|at| at < older_than);
            if stale {
                rule.claimed_at = None;
                rule.claim_token = None;
                rule.updated_at = now;
                requeued.push(rule.id);
            }
        }
        Ok(requeued)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
