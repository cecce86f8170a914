//! Scheduled rule model: a durable record of a deferred STOP or DELETE.
//!
//! Status is monotonic: a rule starts [`RuleStatus::Pending`] and moves to
//! [`RuleStatus::Done`] or [`RuleStatus::Failed`] exactly once. While a
//! scheduler owns a rule it carries a claim marker (`claimed_at` and
//! `claim_token`) but its status stays pending.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum length of the operator note (matches the `varchar(500)` column).
pub const MAX_NOTE_LEN: usize = 500;

// ── Action ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleAction {
    /// Stop the latest deployment of the service.
    Stop,
    /// Permanently delete the service.
    Delete,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "STOP",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STOP" => Ok(Self::Stop),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ValidationError::UnknownAction(s.to_string())),
        }
    }
}

// ── Status ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleStatus {
    Pending,
    Done,
    Failed,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition_to(&self, next: RuleStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Done) | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown rule status '{other}'")),
        }
    }
}

// ── Rule ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: Uuid,
    pub service_id: String,
    /// Environment the service lives in. Falls back to the configured
    /// default environment when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    pub action: RuleAction,
    pub execute_at: DateTime<Utc>,
    pub status: RuleStatus,
    pub executed_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    /// Detail of the most recent dispatch failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Dispatch attempts made so far.
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_token: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Materialize a freshly created rule.
    pub fn new(input: NewRule, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id: input.service_id,
            environment_id: input.environment_id,
            action: input.action,
            execute_at: input.execute_at,
            status: RuleStatus::Pending,
            executed_at: None,
            note: input.note,
            last_error: None,
            attempts: 0,
            claimed_at: None,
            claim_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.claim_token.is_some()
    }

    /// Eligible for execution: pending, unclaimed and `execute_at <= now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == RuleStatus::Pending && !self.is_claimed() && self.execute_at <= now
    }

    /// Apply an operator edit. Callers must check the rule is pending and
    /// unclaimed first. The action is fixed at creation.
    pub fn apply_update(&mut self, update: &RuleUpdate, now: DateTime<Utc>) {
        if let Some(execute_at) = update.execute_at {
            self.execute_at = execute_at;
        }
        if let Some(ref note) = update.note {
            self.note = if note.is_empty() { None } else { Some(note.clone()) };
        }
        self.updated_at = now;
    }
}

/// Validated input for creating a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRule {
    pub service_id: String,
    pub environment_id: Option<String>,
    pub action: RuleAction,
    pub execute_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Validated partial edit of a pending rule. `note = Some("")` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleUpdate {
    pub execute_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl RuleUpdate {
    pub fn is_empty(&self) -> bool {
        self.execute_at.is_none() && self.note.is_none()
    }
}

// ── Raw operator input ────────────────────────────────────────

/// Unvalidated create request as it arrives from an operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleInput {
    pub service_id: String,
    #[serde(default)]
    pub environment_id: Option<String>,
    pub action: String,
    pub execute_at: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl RuleInput {
    pub fn validate(self) -> Result<NewRule, ValidationError> {
        let service_id = self.service_id.trim().to_string();
        if service_id.is_empty() {
            return Err(ValidationError::EmptyServiceId);
        }
        let action = self.action.parse::<RuleAction>()?;
        let execute_at = parse_timestamp(&self.execute_at)?;
        let note = validate_note(self.note)?;
        let environment_id = self
            .environment_id
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        Ok(NewRule {
            service_id,
            environment_id,
            action,
            execute_at,
            note,
        })
    }
}

/// Unvalidated edit request. Omitted fields are left untouched; unknown
/// fields (including `action`, which cannot change) are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleUpdateInput {
    #[serde(default)]
    pub execute_at: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl RuleUpdateInput {
    pub fn validate(self) -> Result<RuleUpdate, ValidationError> {
        let execute_at = self.execute_at.as_deref().map(parse_timestamp).transpose()?;
        let note = match self.note {
            Some(n) => Some(validate_note(Some(n))?.unwrap_or_default()),
            None => None,
        };
        Ok(RuleUpdate {
            execute_at,
            note,
        })
    }
}

fn validate_note(note: Option<String>) -> Result<Option<String>, ValidationError> {
    match note {
        Some(n) => {
            let n = n.trim().to_string();
            let len = n.chars().count();
            if len > MAX_NOTE_LEN {
                return Err(ValidationError::NoteTooLong {
                    len,
                    max: MAX_NOTE_LEN,
                });
            }
            Ok(if n.is_empty() { None } else { Some(n) })
        }
        None => Ok(None),
    }
}

/// Parse an operator timestamp.
///
/// Accepts RFC 3339 (`2025-01-31T18:00:00Z`, `2025-01-31T18:00:00+02:00`)
/// and the offset-less `datetime-local` shapes `YYYY-MM-DDTHH:MM[:SS]`,
/// which are taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(ValidationError::InvalidTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn input(action: &str, execute_at: &str) -> RuleInput {
        RuleInput {
            service_id: "svc1".to_string(),
            environment_id: None,
            action: action.to_string(),
            execute_at: execute_at.to_string(),
            note: None,
        }
    }

    #[test]
    fn validate_accepts_stop_and_delete() {
        let stop = input("STOP", "2025-06-01T10:00:00Z").validate().unwrap();
        assert_eq!(stop.action, RuleAction::Stop);
        let delete = input("delete", "2025-06-01T10:00:00Z").validate().unwrap();
        assert_eq!(delete.action, RuleAction::Delete);
    }

    #[test]
    fn validate_rejects_unknown_action() {
        let err = input("RESTART", "2025-06-01T10:00:00Z").validate().unwrap_err();
        assert_eq!(err, ValidationError::UnknownAction("RESTART".to_string()));
    }

    #[test]
    fn validate_rejects_unparsable_timestamp() {
        let err = input("STOP", "tomorrow-ish").validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTimestamp(_)));
    }

    #[test]
    fn validate_rejects_blank_service() {
        let mut raw = input("STOP", "2025-06-01T10:00:00Z");
        raw.service_id = "   ".to_string();
        assert_eq!(raw.validate().unwrap_err(), ValidationError::EmptyServiceId);
    }

    #[test]
    fn validate_rejects_long_note() {
        let mut raw = input("STOP", "2025-06-01T10:00:00Z");
        raw.note = Some("x".repeat(MAX_NOTE_LEN + 1));
        assert!(matches!(
            raw.validate().unwrap_err(),
            ValidationError::NoteTooLong { .. }
        ));
    }

    #[test]
    fn parse_timestamp_offsets_and_local() {
        let expected = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-06-01T10:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-06-01T08:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-06-01T08:00:00").unwrap(), expected);
    }

    #[test]
    fn status_transitions_are_monotonic() {
        assert!(RuleStatus::Pending.can_transition_to(RuleStatus::Done));
        assert!(RuleStatus::Pending.can_transition_to(RuleStatus::Failed));
        assert!(!RuleStatus::Failed.can_transition_to(RuleStatus::Done));
        assert!(!RuleStatus::Done.can_transition_to(RuleStatus::Pending));
        assert!(!RuleStatus::Failed.can_transition_to(RuleStatus::Pending));
    }

    #[test]
    fn due_requires_pending_unclaimed_and_past() {
        let now = Utc::now();
        let mut rule = Rule::new(
            input("STOP", &(now - Duration::seconds(1)).to_rfc3339())
                .validate()
                .unwrap(),
            now,
        );
        assert!(rule.is_due(now));

        rule.claim_token = Some(Uuid::new_v4());
        assert!(!rule.is_due(now));

        rule.claim_token = None;
        rule.execute_at = now + Duration::hours(1);
        assert!(!rule.is_due(now));
    }

    #[test]
    fn update_input_clears_note_with_empty_string() {
        let update = RuleUpdateInput {
            note: Some(String::new()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(update.note, Some(String::new()));

        let mut rule = Rule::new(
            input("STOP", "2025-06-01T10:00:00Z").validate().unwrap(),
            Utc::now(),
        );
        rule.note = Some("keep me?".to_string());
        rule.apply_update(&update, Utc::now());
        assert_eq!(rule.note, None);
    }

    #[test]
    fn update_input_cannot_carry_an_action() {
        let err = serde_json::from_str::<RuleUpdateInput>(r#"{"action":"DELETE"}"#).unwrap_err();
        assert!(err.to_string().contains("action"), "{err}");

        let update: RuleUpdateInput =
            serde_json::from_str(r#"{"executeAt":"2025-06-01T10:00:00Z"}"#).unwrap();
        let mut rule = Rule::new(
            input("STOP", "2025-01-01T00:00:00Z").validate().unwrap(),
            Utc::now(),
        );
        rule.apply_update(&update.validate().unwrap(), Utc::now());
        assert_eq!(rule.action, RuleAction::Stop);
        assert_eq!(rule.execute_at, Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn rule_serializes_camel_case() {
        let rule = Rule::new(
            input("DELETE", "2025-06-01T10:00:00Z").validate().unwrap(),
            Utc::now(),
        );
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["serviceId"], "svc1");
        assert_eq!(json["action"], "DELETE");
        assert_eq!(json["status"], "PENDING");
        assert!(json["executedAt"].is_null());
    }
}
