use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use content_admin::{
    AppConfig, Command, ExitStatus, ReassignOptions, Reporter, RunOutcome, rejected, run,
};
use std::io::Write;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "content-admin")]
#[command(about = "Owner maintenance for the content store")]
struct Cli {
    /// Store URI, overrides STORE_URI
    #[arg(long, global = true)]
    uri: Option<String>,

    /// Owner role, overrides OWNER_ROLE
    #[arg(long, global = true)]
    role: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Print the current owner
    ShowOwner,
    /// Assign every content record to the owner
    Reassign {
        /// Count what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Apply each collection separately instead of in one transaction
        #[arg(long)]
        no_transaction: bool,
    },
    /// Delete every owner and create a fresh one (password from SUPER_ADMIN_PASSWORD)
    ResetOwner {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Print the configured reassignment plan
    Plan,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match execute(Cli::parse()).await {
        Ok(status) => status.into(),
        Err(e) => {
            error!(error = %e, "aborted");
            eprintln!("Error: {:#}", e);
            ExitStatus::Failure.into()
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitStatus> {
    // configuration errors go through the report like any other failure
    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => return Ok(report(rejected(e))),
    };
    if let Some(uri) = cli.uri {
        config.store.uri = uri.trim().to_string();
    }
    if let Some(role) = cli.role {
        config.owner_role = role;
    }

    let command = match cli.command {
        CliCommand::Plan => {
            let mut out = std::io::stdout().lock();
            for step in config.plan.steps() {
                writeln!(out, "{:<16} {:<12} ({})", step.collection(), step.field, step.kind.label())
                    .context("failed to print the plan")?;
            }
            return Ok(ExitStatus::Success);
        }
        CliCommand::ShowOwner => Command::ShowOwner,
        CliCommand::Reassign { dry_run, no_transaction } => Command::Reassign(ReassignOptions {
            dry_run,
            transactional: config.transactional && !no_transaction,
        }),
        CliCommand::ResetOwner { name, email } => {
            if let Some(name) = name {
                config.seed_name = name;
            }
            if let Some(email) = email {
                config.seed_email = email;
            }
            match config.seed_spec() {
                Ok(spec) => Command::ResetOwner(spec),
                Err(e) => return Ok(report(rejected(e))),
            }
        }
    };

    Ok(report(run(&config, command).await))
}

fn report(outcome: RunOutcome) -> ExitStatus {
    Reporter::stdout().report(&outcome.events);
    outcome.status
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
