mod cli;
mod terminal;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use snoozer_core::config::{load_dotenv, Config};
use snoozer_core::{RuleInput, RuleUpdateInput};
use snoozer_platform::{PlatformClient, PollerConfig, RailwayClient, ServiceSource};
use snoozer_rules::{PgRuleStore, Provisioner, RuleService, RuleStore, SpinUpRequest};

use crate::cli::{CliArgs, Command, RulesCommand, SpinUpArgs};
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();
    let terminal = Terminal::new(args.json);
    let config = Config::from_env();

    if let Err(e) = run(args.command, &config, &terminal).await {
        terminal.print_error(&format!("{e:#}"))?;
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command, config: &Config, terminal: &Terminal) -> Result<()> {
    match command {
        Command::Rules(cmd) => {
            let rules = RuleService::new(open_store(config).await?);
            run_rules(cmd, &rules, terminal).await
        }
        Command::Services { environment } => {
            let environment = resolve_environment(environment, config)?;
            let client = railway_client(config)?;
            let services = client
                .list_services(&environment)
                .await
                .with_context(|| format!("failed to list services of environment {environment}"))?;
            terminal.print_services(&services)
        }
        Command::SpinUp(args) => spin_up(args, config, terminal).await,
        Command::Config => terminal.print_config(&config.redacted_summary()),
    }
}

async fn run_rules(cmd: RulesCommand, rules: &RuleService, terminal: &Terminal) -> Result<()> {
    match cmd {
        RulesCommand::List => terminal.print_rules(&rules.list().await?),
        RulesCommand::Show { id } => terminal.print_rule(&rules.get(id).await?),
        RulesCommand::Create {
            service_id,
            environment_id,
            action,
            execute_at,
            note,
        } => {
            let rule = rules
                .create(RuleInput {
                    service_id,
                    environment_id,
                    action,
                    execute_at,
                    note,
                })
                .await?;
            terminal.print_rule(&rule)
        }
        RulesCommand::Update {
            id,
            execute_at,
            note,
        } => {
            let rule = rules
                .update(id, RuleUpdateInput { execute_at, note })
                .await?;
            terminal.print_rule(&rule)
        }
        RulesCommand::Delete { id } => {
            rules.delete(id).await?;
            terminal.print_info(&format!("rule {id} deleted"))
        }
    }
}

async fn spin_up(args: SpinUpArgs, config: &Config, terminal: &Terminal) -> Result<()> {
    let environment_id = resolve_environment(args.environment_id, config)?;
    let source = match (args.repo, args.image) {
        (Some(repo), _) => ServiceSource::Repo(repo),
        (None, Some(image)) => ServiceSource::Image(image),
        (None, None) => anyhow::bail!("one of --repo or --image is required"),
    };

    // Without a TTL there is no rule to store, so the database is optional.
    let store: Arc<dyn RuleStore> = match args.ttl {
        Some(_) => open_store(config).await?,
        None => Arc::new(snoozer_rules::InMemoryRuleStore::new()),
    };
    let provisioner = Provisioner::new(
        railway_client(config)?,
        store,
        PollerConfig::from(&config.poller),
    );

    let spun = provisioner
        .spin_up(SpinUpRequest {
            name: args.name,
            project_id: args.project_id,
            environment_id,
            source,
            ttl: args.ttl,
        })
        .await?;
    terminal.print_spin_up(&spun)?;

    if args.no_wait {
        spun.poller.cancel();
        return Ok(());
    }

    terminal.print_info("waiting for the deployment to settle (Ctrl-C to stop watching)")?;
    tokio::select! {
        outcome = spun.poller.outcome() => terminal.print_outcome(&outcome),
        _ = tokio::signal::ctrl_c() => {
            // Dropping the handle cancels the poller; the deployment itself continues.
            info!("stopped watching deployment");
            terminal.print_info("stopped watching, the deployment continues on Railway")
        }
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn RuleStore>> {
    if !config.postgres.is_configured() {
        anyhow::bail!("PostgreSQL is not configured: set PG_URL or PG_HOST/PG_DATABASE");
    }
    let store = PgRuleStore::connect(&config.postgres)
        .await
        .context("failed to open the PostgreSQL rule store")?;
    Ok(Arc::new(store))
}

fn railway_client(config: &Config) -> Result<Arc<dyn PlatformClient>> {
    if !config.railway.is_configured() {
        warn!("RAILWAY_API_TOKEN is not set, Railway calls will be rejected");
    }
    let client = RailwayClient::new(&config.railway).context("failed to build the Railway client")?;
    Ok(Arc::new(client))
}

fn resolve_environment(explicit: Option<String>, config: &Config) -> Result<String> {
    explicit
        .or_else(|| config.railway.environment_id.clone())
        .context("no environment given: pass one or set RAILWAY_ENVIRONMENT_ID")
}
