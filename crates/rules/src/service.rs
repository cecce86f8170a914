//! Operator-facing CRUD over rules.
//!
//! Input is validated here, before anything reaches the store. Missing ids
//! surface as [`SnoozerError::NotFound`].

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use snoozer_core::{Result, Rule, RuleInput, RuleUpdateInput, SnoozerError};

use crate::store::RuleStore;

#[derive(Clone)]
pub struct RuleService {
    store: Arc<dyn RuleStore>,
}

impl RuleService {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RuleStore> {
        &self.store
    }

    pub async fn create(&self, input: RuleInput) -> Result<Rule> {
        let new_rule = input.validate()?;
        let rule = self.store.insert(new_rule).await?;
        info!(
            rule_id = %rule.id,
            service_id = %rule.service_id,
            action = %rule.action,
            execute_at = %rule.execute_at,
            "rule created"
        );
        Ok(rule)
    }

    pub async fn list(&self) -> Result<Vec<Rule>> {
        self.store.list().await
    }

    pub async fn get(&self, id: Uuid) -> Result<Rule> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| SnoozerError::rule_not_found(id))
    }

    /// Edit the time or note of a pending, unclaimed rule. An empty edit
    /// returns the rule unchanged.
    pub async fn update(&self, id: Uuid, input: RuleUpdateInput) -> Result<Rule> {
        let update = input.validate()?;
        if update.is_empty() {
            let rule = self.get(id).await?;
            if rule.status.is_terminal() {
                return Err(SnoozerError::RuleNotPending(id));
            }
            if rule.is_claimed() {
                return Err(SnoozerError::RuleInFlight(id));
            }
            return Ok(rule);
        }
        let rule = self.store.update(id, update).await?;
        info!(rule_id = %id, "rule updated");
        Ok(rule)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.store.delete(id).await? {
            return Err(SnoozerError::rule_not_found(id));
        }
        info!(rule_id = %id, "rule deleted");
        Ok(())
    }
}
