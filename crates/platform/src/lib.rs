//! Platform capability surface and the deployment convergence poller.

pub mod poller;
pub mod railway;
pub mod status;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use poller::{ConvergenceOutcome, ConvergencePoller, ConvergenceTarget, PollerConfig, PollerHandle};
pub use railway::RailwayClient;
pub use status::DeploymentStatus;
pub use traits::{
    Ack, PlatformClient, PlatformError, ServiceCreateInput, ServiceHandle, ServiceSource,
    ServiceStatus, ServiceSummary,
};
