//! Deployment convergence poller.
//!
//! One task per watched deployment. Each poller owns its attempt counter and
//! its cancellation token; the only way to reach it is the [`PollerHandle`]
//! returned by [`ConvergencePoller::spawn`].

mod core;
mod handle;
mod outcome;


pub use self::core::{ConvergencePoller, OnSettled};
pub use handle::PollerHandle;
pub use outcome::{ConvergenceOutcome, ConvergenceTarget, PollerConfig, HISTORY_LEN};
