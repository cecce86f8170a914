//! Shared model, error taxonomy and configuration for staging-snoozer.

pub mod config;
pub mod error;
pub mod rule;
pub mod ttl;

pub use config::Config;
pub use error::*;
pub use rule::*;
pub use ttl::{validate_service_name, Ttl};
