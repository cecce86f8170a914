//! [`PgRuleStore`]: rules persisted in the PostgreSQL `rules` table.
//!
//! Enum columns (`rule_status`, `rule_action`) are read back as text and
//! bound with explicit casts, so no custom sqlx type mapping is needed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use snoozer_core::config::PostgresConfig;
use snoozer_core::{NewRule, Result, Rule, RuleAction, RuleStatus, RuleUpdate, SnoozerError};

use super::{RuleStore, TerminalOutcome};

macro_rules! rule_columns {
    () => {
        "id, service_id, environment_id, action::text AS action, execute_at, \
         status::text AS status, executed_at, note, last_error, attempts, \
         claimed_at, claim_token, created_at, updated_at"
    };
}

const INSERT_SQL: &str = concat!(
    "INSERT INTO rules (id, service_id, environment_id, action, execute_at, note, created_at, updated_at)
     VALUES ($1, $2, $3, $4::rule_action, $5, $6, $7, $7)
     RETURNING ",
    rule_columns!()
);

const GET_SQL: &str = concat!("SELECT ", rule_columns!(), " FROM rules WHERE id = $1");

const LIST_SQL: &str = concat!(
    "SELECT ",
    rule_columns!(),
    " FROM rules ORDER BY created_at, id"
);

const UPDATE_SQL: &str = concat!(
    "UPDATE rules
     SET execute_at = COALESCE($2, execute_at),
         note = CASE WHEN $3 THEN NULLIF($4, '') ELSE note END,
         updated_at = $5
     WHERE id = $1 AND status = 'PENDING' AND claim_token IS NULL
     RETURNING ",
    rule_columns!()
);

const LIST_DUE_SQL: &str = concat!(
    "SELECT ",
    rule_columns!(),
    " FROM rules
     WHERE status = 'PENDING' AND claimed_at IS NULL AND execute_at <= $1
     ORDER BY execute_at, created_at"
);

const TRY_CLAIM_SQL: &str = concat!(
    "UPDATE rules
     SET claimed_at = $3, claim_token = $4, updated_at = $3
     WHERE id = $1 AND status = $2::rule_status AND claimed_at IS NULL AND claim_token IS NULL
       AND execute_at <= $3
     RETURNING ",
    rule_columns!()
);

const COMPLETE_SQL: &str = "UPDATE rules
     SET status = $3::rule_status, last_error = $4, executed_at = $5,
         attempts = attempts + 1, claimed_at = NULL, claim_token = NULL, updated_at = $5
     WHERE id = $1 AND claim_token = $2 AND status = 'PENDING'";

const RELEASE_SQL: &str = "UPDATE rules
     SET last_error = $3, attempts = attempts + 1,
         claimed_at = NULL, claim_token = NULL, updated_at = $4
     WHERE id = $1 AND claim_token = $2 AND status = 'PENDING'";

const REQUEUE_SQL: &str = "UPDATE rules
     SET claimed_at = NULL, claim_token = NULL, updated_at = $2
     WHERE status = 'PENDING' AND claimed_at IS NOT NULL AND claimed_at < $1
     RETURNING id";

/// Raw row; enum columns arrive as text.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    service_id: String,
    environment_id: Option<String>,
    action: String,
    execute_at: DateTime<Utc>,
    status: String,
    executed_at: Option<DateTime<Utc>>,
    note: Option<String>,
    last_error: Option<String>,
    attempts: i32,
    claimed_at: Option<DateTime<Utc>>,
    claim_token: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RuleRow> for Rule {
    type Error = SnoozerError;

    fn try_from(row: RuleRow) -> Result<Self> {
        let action = row
            .action
            .parse::<RuleAction>()
            .map_err(|e| SnoozerError::Store(format!("rule {}: {e}", row.id)))?;
        let status = row
            .status
            .parse::<RuleStatus>()
            .map_err(|e| SnoozerError::Store(format!("rule {}: {e}", row.id)))?;
        Ok(Rule {
            id: row.id,
            service_id: row.service_id,
            environment_id: row.environment_id,
            action,
            execute_at: row.execute_at,
            status,
            executed_at: row.executed_at,
            note: row.note,
            last_error: row.last_error,
            attempts: u32::try_from(row.attempts).unwrap_or(0),
            claimed_at: row.claimed_at,
            claim_token: row.claim_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn db_err(e: sqlx::Error) -> SnoozerError {
    SnoozerError::Store(e.to_string())
}

/// Rule store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using `config` and apply pending migrations.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await
            .map_err(db_err)?;
        info!(host = %config.host, database = %config.database, "PostgreSQL connected");

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .map_err(|e| SnoozerError::Store(format!("migration failed: {e}")))?;
        info!("database migrations applied");

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RuleStore for PgRuleStore {
    async fn insert(&self, rule: NewRule) -> Result<Rule> {
        let row = sqlx::query_as::<_, RuleRow>(INSERT_SQL)
            .bind(Uuid::new_v4())
            .bind(&rule.service_id)
            .bind(&rule.environment_id)
            .bind(rule.action.as_str())
            .bind(rule.execute_at)
            .bind(&rule.note)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        row.try_into()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Rule>> {
        sqlx::query_as::<_, RuleRow>(GET_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Rule::try_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Rule>> {
        sqlx::query_as::<_, RuleRow>(LIST_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Rule::try_from)
            .collect()
    }

    async fn update(&self, id: Uuid, update: RuleUpdate) -> Result<Rule> {
        let row = sqlx::query_as::<_, RuleRow>(UPDATE_SQL)
            .bind(id)
            .bind(update.execute_at)
            .bind(update.note.is_some())
            .bind(update.note.as_deref().unwrap_or(""))
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => row.try_into(),
            // Absent, terminal or claimed; tell the caller which.
            None => match self.get(id).await? {
                Some(rule) if rule.status.is_terminal() => Err(SnoozerError::RuleNotPending(id)),
                Some(_) => Err(SnoozerError::RuleInFlight(id)),
                None => Err(SnoozerError::rule_not_found(id)),
            },
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM rules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Rule>> {
        sqlx::query_as::<_, RuleRow>(LIST_DUE_SQL)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Rule::try_from)
            .collect()
    }

    async fn try_claim(
        &self,
        id: Uuid,
        expected: RuleStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Rule>> {
        sqlx::query_as::<_, RuleRow>(TRY_CLAIM_SQL)
            .bind(id)
            .bind(expected.as_str())
            .bind(now)
            .bind(Uuid::new_v4())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Rule::try_from)
            .transpose()
    }

    async fn complete(
        &self,
        id: Uuid,
        claim_token: Uuid,
        outcome: TerminalOutcome,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(COMPLETE_SQL)
            .bind(id)
            .bind(claim_token)
            .bind(outcome.status().as_str())
            .bind(outcome.error())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release(
        &self,
        id: Uuid,
        claim_token: Uuid,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(RELEASE_SQL)
            .bind(id)
            .bind(claim_token)
            .bind(error)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn requeue_stale_claims(
        &self,
        older_than: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(REQUEUE_SQL)
            .bind(older_than)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    fn backend_name(&self) -> &str {
        "postgres"
    }
}
