//! Cadence CLI
//!
//! Runs the two scheduling passes of the Cadence outreach engine against a
//! SQLite database, plus schema initialisation and demo campaign seeding.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use cadence_core::SchedulerConfig;
use cadence_scheduler::{FollowupScheduler, Scheduler};
use cadence_store::{Store, StoreConfig};

/// Cadence: pre-schedule outbound messages for insurance contacts.
#[derive(Parser, Debug)]
#[command(name = "cadence", version, about)]
struct Cli {
    /// Path to the SQLite database file. Created when missing.
    #[arg(long, env = "CADENCE_DB", default_value = "cadence.sqlite3", global = true)]
    db: String,

    /// Optional TOML file overriding scheduler defaults.
    #[arg(long, env = "CADENCE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the main scheduling pass.
    Schedule {
        /// Create or upgrade the schema and exit.
        #[arg(long)]
        init_only: bool,

        /// Seed demo campaign types, instances, and memberships, then
        /// exit.
        #[arg(long)]
        test_campaigns: bool,
    },
    /// Run the behaviour-classified follow-up pass.
    ScheduleFollowups,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading configuration file {}", path.display()))?;
            SchedulerConfig::from_toml_str(&raw)
                .with_context(|| format!("parsing configuration file {}", path.display()))?
        }
        None => SchedulerConfig::default(),
    };

    // Opening the store creates the file and runs migrations.
    let store = Store::open(&StoreConfig::new(cli.db))
        .await
        .context("opening database")?;

    match cli.command {
        Command::Schedule {
            init_only,
            test_campaigns,
        } => {
            if init_only {
                tracing::info!("database schema initialised");
                return Ok(());
            }
            if test_campaigns {
                store
                    .seed_demo_campaigns(Local::now().date_naive())
                    .await
                    .context("seeding demo campaigns")?;
                return Ok(());
            }

            let summary = Scheduler::new(store, config)
                .run()
                .await
                .context("schedule run failed")?;
            println!(
                "run {}: {} contacts, {} scheduled, {} skipped",
                summary.scheduler_run_id,
                summary.contacts_processed,
                summary.emails_scheduled,
                summary.emails_skipped
            );
        }
        Command::ScheduleFollowups => {
            let summary = FollowupScheduler::new(store, config)
                .run()
                .await
                .context("follow-up run failed")?;
            println!(
                "run {}: {} sources, {} follow-ups scheduled",
                summary.scheduler_run_id, summary.contacts_processed, summary.emails_scheduled
            );
        }
    }

    Ok(())
}
