use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub railway: RailwayConfig,
    pub postgres: PostgresConfig,
    pub scheduler: SchedulerSettings,
    pub poller: PollerSettings,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SNOOZER_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("SNOOZER_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            railway: RailwayConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            scheduler: SchedulerSettings::from_env_profiled(p),
            poller: PollerSettings::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  railway:    api_url={}, token={}, environment={}",
            self.railway.api_url,
            if self.railway.is_configured() { "set" } else { "(none)" },
            self.railway.environment_id.as_deref().unwrap_or("(none)")
        );
        tracing::info!("  postgres:   host={}, db={}", self.postgres.host, self.postgres.database);
        tracing::info!(
            "  scheduler:  tick={}s, concurrency={}, claim_grace={}s, max_attempts={}",
            self.scheduler.tick_secs,
            self.scheduler.max_concurrent_dispatches,
            self.scheduler.claim_grace_secs,
            self.scheduler.dispatch_max_attempts
        );
        tracing::info!(
            "  poller:     max_attempts={}, interval={}s",
            self.poller.max_attempts,
            self.poller.interval_secs
        );
    }

    /// Return a redacted view safe for printing (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "railway": {
                "api_url": self.railway.api_url,
                "environment_id": self.railway.environment_id,
                "configured": self.railway.is_configured(),
            },
            "postgres": {
                "host": self.postgres.host,
                "port": self.postgres.port,
                "database": self.postgres.database,
                "configured": self.postgres.is_configured(),
            },
            "scheduler": self.scheduler,
            "poller": self.poller,
        })
    }
}

// ── Railway ───────────────────────────────────────────────────

pub const DEFAULT_RAILWAY_API_URL: &str = "https://backboard.railway.com/graphql/v2";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailwayConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    /// Environment used when a rule does not name one.
    pub environment_id: Option<String>,
    pub request_timeout_secs: u64,
}

impl RailwayConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            api_url: profiled_env_or(p, "RAILWAY_API_URL", DEFAULT_RAILWAY_API_URL),
            api_token: profiled_env_opt(p, "RAILWAY_API_TOKEN"),
            environment_id: profiled_env_opt(p, "RAILWAY_ENVIRONMENT_ID"),
            request_timeout_secs: profiled_env_u64(p, "RAILWAY_TIMEOUT_SECS", 30),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Full connection URL; takes precedence over the individual fields.
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_opt(p, "PG_URL"),
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_u16(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "snoozer"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_u32(p, "PG_MAX_CONNECTIONS", 5),
        }
    }

    pub fn connection_string(&self) -> String {
        if let Some(ref url) = self.url {
            return url.clone();
        }
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some() || self.username.is_some()
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub tick_secs: u64,
    pub max_concurrent_dispatches: usize,
    /// Claims older than this without a terminal status are re-queued.
    pub claim_grace_secs: u64,
    /// Run the stale-claim sweep every N ticks.
    pub reconcile_every_ticks: u32,
    /// Dispatch attempts per rule before it is marked FAILED (1 = no retry).
    pub dispatch_max_attempts: u32,
}

impl SchedulerSettings {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            tick_secs: profiled_env_u64(p, "SCHEDULER_TICK_SECS", 30).max(1),
            max_concurrent_dispatches: profiled_env_u32(p, "SCHEDULER_MAX_CONCURRENT", 4).max(1)
                as usize,
            claim_grace_secs: profiled_env_u64(p, "SCHEDULER_CLAIM_GRACE_SECS", 600),
            reconcile_every_ticks: profiled_env_u32(p, "SCHEDULER_RECONCILE_EVERY", 10).max(1),
            dispatch_max_attempts: profiled_env_u32(p, "DISPATCH_MAX_ATTEMPTS", 1).max(1),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn claim_grace(&self) -> Duration {
        Duration::from_secs(self.claim_grace_secs)
    }
}

// ── Convergence poller ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerSettings {
    pub max_attempts: u32,
    pub interval_secs: u64,
}

impl PollerSettings {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_attempts: profiled_env_u32(p, "POLLER_MAX_ATTEMPTS", 30).max(1),
            interval_secs: profiled_env_u64(p, "POLLER_INTERVAL_SECS", 10).max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
