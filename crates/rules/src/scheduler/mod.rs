//! Background execution of due rules.
//!
//! Each tick scans the store for due rules, claims them one by one, and
//! dispatches the claimed ones concurrently. The claim is the only
//! coordination between executors; a rule that loses the claim race is
//! skipped silently.

mod config;
mod core;
mod reconcile;
mod report;


pub use self::config::{RetryPolicy, SchedulerConfig};
pub use self::core::{RuleScheduler, SchedulerHandle};
pub use self::reconcile::Reconciler;
pub use self::report::TickReport;
