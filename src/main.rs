//! Agent Safety CLI
//!
//! Command-line front end for the safety system: evaluate operations, run
//! the sandbox gate, and inspect the effective configuration.

use agent_safety::{AuditLog, Config, Error, Operation, Result, SafetySecrets, SafetySystem};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "safety-agent")]
#[command(about = "Safety and risk gate for an autonomous trading agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single operation
    Check {
        /// Operation as JSON, e.g. '{"operation_type":"market_analysis"}'
        operation: String,
    },

    /// Evaluate a JSONL file of operations in order
    ///
    /// Approved trades are recorded as executed, so daily limits build up
    /// the way they would in a live session.
    Replay {
        /// File with one operation per line
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run a named operation through the sandbox gate
    ///
    /// State lives only for this invocation, so a confirmation ticket issued
    /// outside sandbox mode can only be approved here, via `--approve`.
    Sandbox {
        /// Operation name (market_analysis, real_trade, ...)
        operation: String,

        /// Parameters as JSON
        #[arg(short = 'P', long)]
        params: Option<String>,

        /// Leave sandbox mode first (needs SAFETY_ADMIN_KEY)
        #[arg(long)]
        admin_key: Option<String>,

        /// Approve the confirmation ticket the gate issues
        #[arg(long)]
        approve: bool,

        /// Operator approval code (when SAFETY_APPROVAL_CODE is set)
        #[arg(long, requires = "approve")]
        code: Option<String>,
    },

    /// Trigger an emergency stop and print the resulting status
    ///
    /// A drill: the stop only applies to this process. Embedders call
    /// `SafetySystem::emergency_stop` on their long-lived instance.
    EmergencyStop {
        /// Why the stop was triggered
        #[arg(short, long, default_value = "manual kill switch")]
        reason: String,
    },

    /// Show the current safety status
    Status,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    let (plain, json) = if cli.json_logs {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let system = build_system(&config);

    match cli.command {
        Commands::Check { operation } => {
            let operation = parse_operation(&operation)?;
            let decision = system.check_operation_safety(&operation).await;
            print_json(&decision)?;
        }
        Commands::Replay { file } => {
            run_replay(&system, file).await?;
        }
        Commands::Sandbox {
            operation,
            params,
            admin_key,
            approve,
            code,
        } => {
            let params = match params {
                Some(raw) => serde_json::from_str(&raw)
                    .map_err(|e| Error::InvalidArgument(format!("invalid --params: {}", e)))?,
                None => serde_json::json!({}),
            };
            if let Some(key) = admin_key {
                if !system.disable_sandbox_mode(&key).await {
                    return Err(Error::InvalidArgument(
                        "admin key rejected; sandbox mode stays enabled".to_string(),
                    ));
                }
            }
            let response = system.execute_in_sandbox(&operation, &params).await;
            print_json(&response)?;
            if approve {
                approve_ticket(&system, response.confirmation_id.as_deref(), code).await?;
            }
        }
        Commands::EmergencyStop { reason } => {
            system.emergency_stop(&reason).await;
            print_json(&system.get_safety_status().await)?;
        }
        Commands::Status => {
            print_json(&system.get_safety_status().await)?;
        }
        Commands::Config => {
            print_json(&config)?;
        }
    }

    Ok(())
}

fn build_system(config: &Config) -> SafetySystem {
    let mut builder =
        SafetySystem::builder(config.safety.clone()).secrets(SafetySecrets::from_env());
    if let Some(path) = &config.audit_log_path {
        tracing::info!(path = %path, "Writing audit log");
        builder = builder.audit_log(AuditLog::new(path));
    }
    builder.build()
}

async fn approve_ticket(
    system: &SafetySystem,
    confirmation_id: Option<&str>,
    code: Option<String>,
) -> Result<()> {
    let Some(id) = confirmation_id else {
        return Err(Error::InvalidArgument(
            "nothing to approve; the sandbox gate issued no confirmation ticket".to_string(),
        ));
    };
    let approved = system.approve_operation(id, code.as_deref()).await;
    print_json(&serde_json::json!({
        "confirmation_id": id,
        "approved": approved,
    }))
}

fn parse_operation(raw: &str) -> Result<Operation> {
    serde_json::from_str(raw)
        .map_err(|e| Error::InvalidArgument(format!("invalid operation JSON: {}", e)))
}

async fn run_replay(system: &SafetySystem, file: PathBuf) -> Result<()> {
    let content = tokio::fs::read_to_string(&file).await?;

    let mut approved = 0usize;
    let mut rejected = 0usize;
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let operation = parse_operation(line).map_err(|e| {
            Error::InvalidArgument(format!("{}:{}: {}", file.display(), index + 1, e))
        })?;

        let decision = system.check_operation_safety(&operation).await;
        if decision.approved {
            approved += 1;
            if let Operation::SmallTrade(trade) | Operation::LargeTrade(trade) = &operation {
                system.update_daily_limits(trade).await?;
            }
        } else {
            rejected += 1;
            tracing::warn!(
                line = index + 1,
                violations = ?decision.violation_messages(),
                "Operation rejected"
            );
        }
        println!("{}", serde_json::to_string(&decision)?);
    }

    tracing::info!(approved, rejected, "Replay finished");
    print_json(&system.get_safety_status().await)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
