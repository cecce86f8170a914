//! Contract tests for the rule store, run against the in-memory backend.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use snoozer_core::{NewRule, RuleAction, RuleStatus, RuleUpdate, SnoozerError};

use super::{InMemoryRuleStore, RuleStore, TerminalOutcome};

fn new_rule(service: &str, offset_secs: i64) -> NewRule {
    NewRule {
        service_id: service.to_string(),
        environment_id: None,
        action: RuleAction::Stop,
        execute_at: Utc::now() + Duration::seconds(offset_secs),
        note: None,
    }
}

#[tokio::test]
async fn insert_starts_pending_and_unclaimed() {
    let store = InMemoryRuleStore::new();
    let rule = store.insert(new_rule("svc-1", 60)).await.unwrap();

    assert_eq!(rule.status, RuleStatus::Pending);
    assert!(rule.executed_at.is_none());
    assert!(!rule.is_claimed());
    assert_eq!(rule.attempts, 0);
    assert_eq!(store.get(rule.id).await.unwrap(), Some(rule));
}

#[tokio::test]
async fn list_due_excludes_future_claimed_and_terminal() {
    let store = InMemoryRuleStore::new();
    let now = Utc::now();
    let early = store.insert(new_rule("svc-early", -120)).await.unwrap();
    let late = store.insert(new_rule("svc-late", -60)).await.unwrap();
    let future = store.insert(new_rule("svc-future", 3600)).await.unwrap();
    let claimed = store.insert(new_rule("svc-claimed", -30)).await.unwrap();
    let done = store.insert(new_rule("svc-done", -30)).await.unwrap();

    store.try_claim(claimed.id, RuleStatus::Pending, now).await.unwrap().unwrap();
    let c = store.try_claim(done.id, RuleStatus::Pending, now).await.unwrap().unwrap();
    assert!(store
        .complete(done.id, c.claim_token.unwrap(), TerminalOutcome::Done, now)
        .await
        .unwrap());

    let due: Vec<Uuid> = store
        .list_due(now)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(due, vec![early.id, late.id]);
    assert!(!due.contains(&future.id));
}

#[tokio::test]
async fn claim_is_exclusive() {
    let store = InMemoryRuleStore::new();
    let rule = store.insert(new_rule("svc-1", -1)).await.unwrap();
    let now = Utc::now();

    let first = store.try_claim(rule.id, RuleStatus::Pending, now).await.unwrap();
    let second = store.try_claim(rule.id, RuleStatus::Pending, now).await.unwrap();

    let first = first.expect("first claim wins");
    assert!(first.claim_token.is_some());
    assert_eq!(first.claimed_at, Some(now));
    assert_eq!(first.status, RuleStatus::Pending);
    assert!(second.is_none());
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let store = Arc::new(InMemoryRuleStore::new());
    let rule = store.insert(new_rule("svc-1", -1)).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .try_claim(rule.id, RuleStatus::Pending, Utc::now())
                .await
                .unwrap()
                .is_some()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn future_rule_cannot_be_claimed() {
    let store = InMemoryRuleStore::new();
    let rule = store.insert(new_rule("svc-1", 3600)).await.unwrap();
    let now = Utc::now();

    assert!(store
        .try_claim(rule.id, RuleStatus::Pending, now)
        .await
        .unwrap()
        .is_none());
    assert!(!store.get(rule.id).await.unwrap().unwrap().is_claimed());

    let later = now + Duration::hours(2);
    assert!(store
        .try_claim(rule.id, RuleStatus::Pending, later)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn claim_with_wrong_expected_status_has_no_effect() {
    let store = InMemoryRuleStore::new();
    let rule = store.insert(new_rule("svc-1", -1)).await.unwrap();

    let claimed = store
        .try_claim(rule.id, RuleStatus::Done, Utc::now())
        .await
        .unwrap();
    assert!(claimed.is_none());
    assert!(!store.get(rule.id).await.unwrap().unwrap().is_claimed());

    let missing = store
        .try_claim(Uuid::new_v4(), RuleStatus::Pending, Utc::now())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn complete_requires_the_current_token() {
    let store = InMemoryRuleStore::new();
    let rule = store.insert(new_rule("svc-1", -1)).await.unwrap();
    let now = Utc::now();
    let claimed = store.try_claim(rule.id, RuleStatus::Pending, now).await.unwrap().unwrap();
    let token = claimed.claim_token.unwrap();

    let foreign = store
        .complete(rule.id, Uuid::new_v4(), TerminalOutcome::Done, now)
        .await
        .unwrap();
    assert!(!foreign);

    let ok = store
        .complete(rule.id, token, TerminalOutcome::Failed("boom".into()), now)
        .await
        .unwrap();
    assert!(ok);

    let stored = store.get(rule.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RuleStatus::Failed);
    assert_eq!(stored.last_error.as_deref(), Some("boom"));
    assert_eq!(stored.executed_at, Some(now));
    assert_eq!(stored.attempts, 1);
    assert!(!stored.is_claimed());

    // A terminal rule never moves again, even with the old token.
    let again = store
        .complete(rule.id, token, TerminalOutcome::Done, now)
        .await
        .unwrap();
    assert!(!again);
    assert_eq!(
        store.get(rule.id).await.unwrap().unwrap().status,
        RuleStatus::Failed
    );
}

#[tokio::test]
async fn release_keeps_rule_pending_and_due() {
    let store = InMemoryRuleStore::new();
    let rule = store.insert(new_rule("svc-1", -1)).await.unwrap();
    let now = Utc::now();
    let claimed = store.try_claim(rule.id, RuleStatus::Pending, now).await.unwrap().unwrap();

    let released = store
        .release(rule.id, claimed.claim_token.unwrap(), Some("timeout".into()), now)
        .await
        .unwrap();
    assert!(released);

    let stored = store.get(rule.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RuleStatus::Pending);
    assert!(stored.executed_at.is_none());
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.last_error.as_deref(), Some("timeout"));
    assert_eq!(store.list_due(now).await.unwrap().len(), 1);
}

#[tokio::test]
async fn stale_claims_are_requeued_and_old_token_is_void() {
    let store = InMemoryRuleStore::new();
    let stale = store.insert(new_rule("svc-stale", -3600)).await.unwrap();
    let fresh = store.insert(new_rule("svc-fresh", -600)).await.unwrap();
    let now = Utc::now();

    let old_claim = store
        .try_claim(stale.id, RuleStatus::Pending, now - Duration::minutes(30))
        .await
        .unwrap()
        .unwrap();
    store.try_claim(fresh.id, RuleStatus::Pending, now).await.unwrap().unwrap();

    let requeued = store
        .requeue_stale_claims(now - Duration::minutes(10), now)
        .await
        .unwrap();
    assert_eq!(requeued, vec![stale.id]);

    let requeued_rule = store.get(stale.id).await.unwrap().unwrap();
    assert_eq!(requeued_rule.updated_at, now);
    assert!(requeued_rule.updated_at > old_claim.updated_at);

    let due: Vec<Uuid> = store.list_due(now).await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(due, vec![stale.id]);

    // The executor that lost its claim cannot write a terminal status.
    let late = store
        .complete(stale.id, old_claim.claim_token.unwrap(), TerminalOutcome::Done, now)
        .await
        .unwrap();
    assert!(!late);
}

#[tokio::test]
async fn update_rejects_claimed_terminal_and_missing_rules() {
    let store = InMemoryRuleStore::new();
    let rule = store.insert(new_rule("svc-1", -1)).await.unwrap();

    let edit = RuleUpdate {
        note: Some("bye".into()),
        ..Default::default()
    };
    let updated = store.update(rule.id, edit.clone()).await.unwrap();
    assert_eq!(updated.action, RuleAction::Stop);
    assert_eq!(updated.note.as_deref(), Some("bye"));

    let now = Utc::now();
    let claimed = store.try_claim(rule.id, RuleStatus::Pending, now).await.unwrap().unwrap();

    // No edits while a dispatch is in flight.
    let postpone = RuleUpdate {
        execute_at: Some(now + Duration::hours(1)),
        ..Default::default()
    };
    assert!(matches!(
        store.update(rule.id, postpone).await,
        Err(SnoozerError::RuleInFlight(id)) if id == rule.id
    ));
    assert_eq!(store.get(rule.id).await.unwrap().unwrap().execute_at, rule.execute_at);

    store
        .complete(rule.id, claimed.claim_token.unwrap(), TerminalOutcome::Done, now)
        .await
        .unwrap();

    assert!(matches!(
        store.update(rule.id, edit.clone()).await,
        Err(SnoozerError::RuleNotPending(id)) if id == rule.id
    ));
    assert!(matches!(
        store.update(Uuid::new_v4(), edit).await,
        Err(SnoozerError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_works_in_any_status() {
    let store = InMemoryRuleStore::new();
    let rule = store.insert(new_rule("svc-1", -1)).await.unwrap();
    let now = Utc::now();
    let claimed = store.try_claim(rule.id, RuleStatus::Pending, now).await.unwrap().unwrap();
    store
        .complete(rule.id, claimed.claim_token.unwrap(), TerminalOutcome::Done, now)
        .await
        .unwrap();

    assert!(store.delete(rule.id).await.unwrap());
    assert!(!store.delete(rule.id).await.unwrap());
    assert!(store.is_empty().await);
}
