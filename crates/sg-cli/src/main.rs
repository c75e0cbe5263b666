//! SOC Guard CLI
//!
//! Command-line interface for inspecting and exercising the SOC Guard access
//! guard: role permissions, payload validation, rate limit simulation and key
//! generation.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

mod commands;

use commands::{parse_offsets, run_simulation, SimulationConfig};
use sg_core::validation::{check_incident_fields, check_integration_payload};
use sg_core::{
    cipher_from_env, generate_key, is_profile_permitted, spawn_cleanup_task, ActionClass,
    GuardConfig, IncidentFilter, IncidentService, IntegrationConfig, IntegrationService,
    IntegrationType, MockBackend, NewIncident, PermissionAction, RateLimitConfig, Role, Severity,
    SystemClock, UserProfile,
};
use sg_observability::{init_logging_with_config, install_prometheus_recorder, LoggingConfig};

#[derive(Parser)]
#[command(name = "socguard")]
#[command(author = "SOC Guard Team")]
#[command(version)]
#[command(about = "Access guard and rate limiter for the SOC dashboard", long_about = None)]
struct Cli {
    /// Guard configuration file (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a role may perform an action
    Permission {
        /// Role (admin, analyst, viewer)
        role: Role,

        /// Action (create, read, update, delete)
        action: PermissionAction,

        /// Treat the account as deactivated
        #[arg(long)]
        inactive: bool,
    },

    /// Validate an integration payload
    ValidateIntegration {
        /// Integration (splunk, slack, virus_total, cloud_watch)
        integration: String,

        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        webhook_url: Option<String>,
    },

    /// Validate incident fields
    ValidateIncident {
        /// Incident title
        title: String,

        /// Severity (low, medium, high, critical)
        severity: String,
    },

    /// Replay a request schedule against the rate limiter
    Simulate {
        /// Action class whose configured limit is used
        #[arg(long, default_value = "api_call")]
        class: ActionClass,

        /// Override the request limit
        #[arg(long)]
        max_requests: Option<u32>,

        /// Override the window length in milliseconds
        #[arg(long)]
        window_ms: Option<u64>,

        /// Comma-separated request offsets in milliseconds
        #[arg(long, default_value = "0,10,20,30,61000")]
        at: String,

        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },

    /// Run the guarded services against an in-memory backend
    Demo {
        /// Role of the signed-in demo user
        #[arg(long, default_value = "analyst")]
        role: Role,
    },

    /// Generate a base64 API key encryption key
    GenKey,

    /// Show the effective guard configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    init_logging_with_config(LoggingConfig {
        level: log_level,
        json_format: cli.format == OutputFormat::Json,
        ..Default::default()
    })?;

    let config = GuardConfig::load_or_default(cli.config.as_deref()).with_context(|| {
        match &cli.config {
            Some(path) => format!("Failed to load guard configuration from {}", path.display()),
            None => "Invalid guard configuration".to_string(),
        }
    })?;

    match cli.command {
        Commands::Permission {
            role,
            action,
            inactive,
        } => cmd_permission(role, action, inactive, cli.format),
        Commands::ValidateIntegration {
            integration,
            api_key,
            webhook_url,
        } => cmd_validate_integration(&integration, api_key, webhook_url, cli.format),
        Commands::ValidateIncident { title, severity } => {
            cmd_validate_incident(&title, &severity, cli.format)
        }
        Commands::Simulate {
            class,
            max_requests,
            window_ms,
            at,
            metrics,
        } => {
            let configured = config.rate_limits.for_class(class);
            let limit = RateLimitConfig::new(
                window_ms.unwrap_or(configured.window_ms),
                max_requests.unwrap_or(configured.max_requests),
            );
            if !limit.is_valid() {
                bail!("window and request limit must both be greater than zero");
            }
            let offsets_ms = parse_offsets(&at).map_err(anyhow::Error::msg)?;
            cmd_simulate(
                SimulationConfig {
                    class,
                    limit,
                    offsets_ms,
                },
                metrics,
                cli.format,
            )
        }
        Commands::Demo { role } => cmd_demo(&config, role, cli.format).await,
        Commands::GenKey => cmd_gen_key(cli.format),
        Commands::Config => cmd_config(&config, cli.format),
    }
}

fn cmd_permission(
    role: Role,
    action: PermissionAction,
    inactive: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut profile = UserProfile::new(role);
    if inactive {
        profile = profile.deactivated();
    }
    let allowed = is_profile_permitted(&profile, action);

    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "role": role,
                "action": action,
                "active": !inactive,
                "allowed": allowed,
            }))?
        );
    } else if allowed {
        println!("{} {} may {}", "ALLOWED".green().bold(), role, action);
    } else if inactive {
        println!("{} inactive accounts may not {}", "DENIED".red().bold(), action);
    } else {
        println!("{} {} may not {}", "DENIED".red().bold(), role, action);
    }

    Ok(())
}

fn cmd_validate_integration(
    integration: &str,
    api_key: Option<String>,
    webhook_url: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let Some(integration) = IntegrationType::from_db_str(integration) else {
        bail!(
            "Unknown integration '{}' (expected splunk, slack, virus_total or cloud_watch)",
            integration
        );
    };
    let payload = IntegrationConfig {
        enabled: true,
        api_key,
        webhook_url,
    };
    let result = check_integration_payload(integration.kind(), &payload);

    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "integration": integration.as_db_str(),
                "valid": result.is_ok(),
                "error": result.as_ref().err().map(|e| e.to_string()),
            }))?
        );
    } else {
        match &result {
            Ok(()) => println!("{} {} configuration is valid", "OK".green().bold(), integration),
            Err(e) => println!("{} {}: {}", "INVALID".red().bold(), integration, e),
        }
    }

    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_validate_incident(title: &str, severity: &str, format: OutputFormat) -> Result<()> {
    let result = check_incident_fields(title, severity);

    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "valid": result.is_ok(),
                "severity": result.as_ref().ok().map(|s| s.as_str()),
                "error": result.as_ref().err().map(|e| e.to_string()),
            }))?
        );
    } else {
        match &result {
            Ok(severity) => println!(
                "{} incident fields are valid (severity: {})",
                "OK".green().bold(),
                severity
            ),
            Err(e) => println!("{} {}", "INVALID".red().bold(), e),
        }
    }

    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_simulate(config: SimulationConfig, metrics: bool, format: OutputFormat) -> Result<()> {
    let handle = if metrics {
        Some(install_prometheus_recorder()?)
    } else {
        None
    };

    let steps = run_simulation(&config);

    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "class": config.class,
                "window_ms": config.limit.window_ms,
                "max_requests": config.limit.max_requests,
                "steps": steps,
            }))?
        );
    } else {
        println!(
            "{} {} ({} per {} ms)",
            "Simulating".bold(),
            config.class,
            config.limit.max_requests,
            config.limit.window_ms
        );
        println!("─────────────────────");
        for step in &steps {
            if step.allowed {
                println!("  t={:>8} ms  {}", step.at_ms, "allowed".green());
            } else {
                println!(
                    "  t={:>8} ms  {}  (retry in {} ms)",
                    step.at_ms,
                    "denied".red(),
                    step.wait_ms
                );
            }
        }
        let allowed = steps.iter().filter(|s| s.allowed).count();
        println!();
        println!("  Allowed: {}  Denied: {}", allowed, steps.len() - allowed);
    }

    if let Some(handle) = handle {
        println!();
        print!("{}", handle.render());
    }

    Ok(())
}

async fn cmd_demo(config: &GuardConfig, role: Role, format: OutputFormat) -> Result<()> {
    let user = UserProfile::new(role);
    let backend = Arc::new(MockBackend::with_user(user.clone()));
    let guard = config.build_guard(Arc::new(SystemClock));
    let cleanup = spawn_cleanup_task(guard.limiter().clone(), config.cleanup_interval());

    let integrations = IntegrationService::new(backend.clone(), guard.clone(), cipher_from_env());
    let incidents = IncidentService::new(backend.clone(), guard);

    let mut outcomes = Vec::new();

    let saved = integrations
        .save_config(
            IntegrationType::Slack,
            IntegrationConfig::with_webhook("https://hooks.slack.com/services/T000/B000/demo"),
        )
        .await;
    outcomes.push(("save Slack integration", saved.map(|_| ())));

    let configs = integrations.get_configs().await;
    let enabled: Vec<_> = configs
        .as_ref()
        .map(|configs| {
            configs
                .iter()
                .filter(|(_, c)| c.enabled)
                .map(|(t, c)| (*t, c.masked()))
                .collect()
        })
        .unwrap_or_default();
    outcomes.push(("load integrations", configs.map(|_| ())));

    let created = incidents
        .create(
            NewIncident::new("Impossible travel for <svc-backup>", Severity::High)
                .with_description("Sign-ins from two continents within 5 minutes"),
        )
        .await;
    let created_id = created.as_ref().ok().map(|i| i.id.to_string());
    outcomes.push(("create incident", created.map(|_| ())));

    let listed = incidents.list(&IncidentFilter::default()).await;
    let listed_count = listed.as_ref().map(Vec::len).unwrap_or(0);
    outcomes.push(("list incidents", listed.map(|_| ())));

    if let Some(id) = &created_id {
        outcomes.push(("delete incident", incidents.delete(id).await));
    }

    cleanup.abort();
    let audit = backend.audit_entries().await;

    if format == OutputFormat::Json {
        let steps: Vec<_> = outcomes
            .iter()
            .map(|(step, result)| {
                json!({
                    "step": step,
                    "ok": result.is_ok(),
                    "error": result.as_ref().err().map(|e| e.user_message()),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "user": user,
                "steps": steps,
                "integrations": enabled
                    .iter()
                    .map(|(t, c)| json!({ "type": t, "config": c }))
                    .collect::<Vec<_>>(),
                "incidents_listed": listed_count,
                "audit_log": audit,
            }))?
        );
    } else {
        println!("{} signed in as {}", "Demo".bold(), role);
        println!("─────────────────────");
        for (step, result) in &outcomes {
            match result {
                Ok(()) => println!("  {:<24} {}", step, "ok".green()),
                Err(e) => println!("  {:<24} {} {}", step, "rejected".red(), e.user_message()),
            }
        }
        println!();
        println!("{}", "Enabled integrations".bold());
        for (integration_type, config) in &enabled {
            println!(
                "  {:<24} {}",
                integration_type.to_string(),
                serde_json::to_string(config)?
            );
        }
        println!();
        println!("{}", "Audit log".bold());
        for entry in &audit {
            println!("  {:<24} {}", entry.action, entry.details);
        }
    }

    Ok(())
}

fn cmd_gen_key(format: OutputFormat) -> Result<()> {
    let key = generate_key();
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&json!({ "key": key }))?);
    } else {
        println!("{}", key);
        eprintln!(
            "{}",
            format!("Export it as {}", sg_core::crypto::ENCRYPTION_KEY_ENV).dimmed()
        );
    }
    Ok(())
}

fn cmd_config(config: &GuardConfig, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", serde_yaml::to_string(config)?);
    }
    Ok(())
}
