//! Scheduled action engine for Railway services.
//!
//! This crate provides:
//! - The rule store contract with in-memory and PostgreSQL backends
//! - Operator CRUD over rules ([`RuleService`])
//! - The action dispatcher mapping STOP/DELETE onto platform calls
//! - The claim-based background scheduler and stale-claim reconciliation
//! - Service spin-up with an auto-shutdown TTL

pub mod dispatcher;
pub mod provision;
pub mod scheduler;
pub mod service;
pub mod store;

pub use dispatcher::{ActionDispatcher, DispatchDetail, DispatchOutcome};
pub use provision::{ProvisionError, Provisioner, SpinUp, SpinUpRequest};
pub use scheduler::{RetryPolicy, RuleScheduler, SchedulerConfig, SchedulerHandle, TickReport};
pub use service::RuleService;
pub use store::{InMemoryRuleStore, PgRuleStore, RuleStore, TerminalOutcome};
