use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use snoozer_core::Ttl;

/// Operator CLI for Staging Snoozer.
///
/// Manages scheduled STOP/DELETE rules, inspects Railway services and spins
/// up new ones with an auto-shutdown TTL.
#[derive(Parser, Debug)]
#[command(name = "snoozer", version, about = "Operator CLI for Staging Snoozer")]
pub struct CliArgs {
    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage scheduled rules
    #[command(subcommand)]
    Rules(RulesCommand),

    /// List the services of an environment with their deployment status
    Services {
        /// Railway environment id (defaults to RAILWAY_ENVIRONMENT_ID)
        environment: Option<String>,
    },

    /// Create and deploy a service, optionally scheduling its shutdown
    SpinUp(SpinUpArgs),

    /// Show the resolved configuration (secrets redacted)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List every rule, oldest first
    List,

    /// Show one rule
    Show { id: Uuid },

    /// Schedule a new rule
    Create {
        #[arg(long)]
        service_id: String,

        /// Environment to resolve the deployment in (STOP only)
        #[arg(long)]
        environment_id: Option<String>,

        /// STOP or DELETE
        #[arg(long)]
        action: String,

        /// RFC 3339 timestamp, e.g. 2026-03-01T18:00:00Z
        #[arg(long)]
        execute_at: String,

        #[arg(long)]
        note: Option<String>,
    },

    /// Edit a pending rule's time or note (the action is fixed)
    Update {
        id: Uuid,

        #[arg(long)]
        execute_at: Option<String>,

        /// Pass an empty string to clear the note
        #[arg(long)]
        note: Option<String>,
    },

    /// Delete a rule in any status
    Delete { id: Uuid },
}

#[derive(Args, Debug)]
pub struct SpinUpArgs {
    /// Service name (letters, digits and hyphens)
    pub name: String,

    #[arg(long, env = "RAILWAY_PROJECT_ID")]
    pub project_id: String,

    /// Defaults to RAILWAY_ENVIRONMENT_ID
    #[arg(long)]
    pub environment_id: Option<String>,

    /// GitHub repository as owner/name
    #[arg(long, conflicts_with = "image", required_unless_present = "image")]
    pub repo: Option<String>,

    /// Docker image reference
    #[arg(long)]
    pub image: Option<String>,

    /// Auto-shutdown after 1h, 6h, 24h, 1w or any number of hours up to a week
    #[arg(long)]
    pub ttl: Option<Ttl>,

    /// Return as soon as the deployment is triggered
    #[arg(long)]
    pub no_wait: bool,
}
