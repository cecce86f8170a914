use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use serde_json::Value;
use std::io::{self, Write};

use snoozer_core::{Rule, RuleStatus};
use snoozer_platform::{ConvergenceOutcome, DeploymentStatus, ServiceSummary};
use snoozer_rules::SpinUp;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const OK: Color = Color::Green;
    const PENDING: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

fn rule_status_color(status: RuleStatus) -> Color {
    match status {
        RuleStatus::Pending => Colors::PENDING,
        RuleStatus::Done => Colors::OK,
        RuleStatus::Failed => Colors::ERROR,
    }
}

fn deployment_color(status: &DeploymentStatus) -> Color {
    match status {
        DeploymentStatus::Success => Colors::OK,
        DeploymentStatus::Failed | DeploymentStatus::Crashed => Colors::ERROR,
        s if s.is_stopped() => Colors::DIM,
        _ => Colors::PENDING,
    }
}

/// Writes command results either as colored tables or as JSON.
pub struct Terminal {
    json: bool,
}

impl Terminal {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn print_json(&self, value: &Value) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn print_colored(&self, color: Color, text: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, SetForegroundColor(color), Print(text), ResetColor)?;
        Ok(())
    }

    fn print_header(&self, text: &str) -> Result<()> {
        self.print_colored(Colors::HEADER, text)?;
        println!();
        Ok(())
    }

    pub fn print_info(&self, msg: &str) -> Result<()> {
        if !self.json {
            self.print_colored(Colors::DIM, msg)?;
            println!();
        }
        Ok(())
    }

    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(Colors::ERROR),
            Print(format!("error: {msg}\n")),
            ResetColor
        )?;
        stderr.flush()?;
        Ok(())
    }

    pub fn print_rules(&self, rules: &[Rule]) -> Result<()> {
        if self.json {
            return self.print_json(&serde_json::to_value(rules)?);
        }
        if rules.is_empty() {
            return self.print_info("no rules");
        }
        self.print_header(&format!(
            "{:<36}  {:<7}  {:<6}  {:<20}  {:<25}  NOTE",
            "ID", "STATUS", "ACTION", "SERVICE", "EXECUTE AT"
        ))?;
        for rule in rules {
            print!("{:<36}  ", rule.id);
            self.print_colored(
                rule_status_color(rule.status),
                &format!("{:<7}", rule.status.as_str()),
            )?;
            println!(
                "  {:<6}  {:<20}  {:<25}  {}",
                rule.action,
                rule.service_id,
                rule.execute_at.to_rfc3339(),
                rule.note.as_deref().unwrap_or("")
            );
        }
        Ok(())
    }

    pub fn print_rule(&self, rule: &Rule) -> Result<()> {
        if self.json {
            return self.print_json(&serde_json::to_value(rule)?);
        }
        let dash = || "-".to_string();
        println!("id:           {}", rule.id);
        print!("status:       ");
        self.print_colored(rule_status_color(rule.status), rule.status.as_str())?;
        println!();
        println!("action:       {}", rule.action);
        println!("service:      {}", rule.service_id);
        println!(
            "environment:  {}",
            rule.environment_id.clone().unwrap_or_else(dash)
        );
        println!("execute at:   {}", rule.execute_at.to_rfc3339());
        println!(
            "executed at:  {}",
            rule.executed_at.map(|t| t.to_rfc3339()).unwrap_or_else(dash)
        );
        println!("attempts:     {}", rule.attempts);
        println!("note:         {}", rule.note.clone().unwrap_or_else(dash));
        if let Some(err) = &rule.last_error {
            print!("last error:   ");
            self.print_colored(Colors::ERROR, err)?;
            println!();
        }
        Ok(())
    }

    pub fn print_services(&self, services: &[ServiceSummary]) -> Result<()> {
        if self.json {
            return self.print_json(&serde_json::to_value(services)?);
        }
        if services.is_empty() {
            return self.print_info("no services in this environment");
        }
        self.print_header(&format!(
            "{:<36}  {:<24}  {:<12}  LAST DEPLOY",
            "ID", "NAME", "STATUS"
        ))?;
        for svc in services {
            print!("{:<36}  {:<24}  ", svc.id, svc.name);
            self.print_colored(deployment_color(&svc.status), &format!("{:<12}", svc.status))?;
            println!(
                "  {}",
                svc.last_deploy_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
        Ok(())
    }

    pub fn print_spin_up(&self, spun: &SpinUp) -> Result<()> {
        if self.json {
            return self.print_json(&serde_json::json!({
                "service": spun.service,
                "deploymentId": spun.deployment_id,
                "shutdownRule": spun.shutdown_rule,
            }));
        }
        self.print_colored(Colors::OK, "service created: ")?;
        println!("{} ({})", spun.service.name, spun.service.id);
        println!("deployment:      {}", spun.deployment_id);
        match &spun.shutdown_rule {
            Some(rule) => println!(
                "auto-shutdown:   {} (rule {})",
                rule.execute_at.to_rfc3339(),
                rule.id
            ),
            None => println!("auto-shutdown:   none"),
        }
        Ok(())
    }

    pub fn print_config(&self, summary: &Value) -> Result<()> {
        self.print_json(summary)
    }

    pub fn print_outcome(&self, outcome: &ConvergenceOutcome) -> Result<()> {
        if self.json {
            return self.print_json(&serde_json::to_value(outcome)?);
        }
        let color = if outcome.is_converged() {
            outcome.last_status().map(deployment_color).unwrap_or(Colors::OK)
        } else {
            Colors::PENDING
        };
        self.print_colored(color, &outcome.describe())?;
        println!();
        Ok(())
    }
}
