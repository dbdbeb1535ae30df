//! Saldo batch jobs.
//!
//! Each subcommand runs one job to completion and prints its summary as
//! JSON on stdout. Scheduling is left to cron or the orchestrator.
//!
//! Usage:
//!   saldo-jobs accrual [--year Y] [--through-month M]
//!   saldo-jobs reconcile [--auto-fix] [--year Y] [--batch-size N]
//!   saldo-jobs rollover [--from-year Y]

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use saldo_clients::ServiceClients;
use saldo_core::accrual::ContractDirectory;
use saldo_db::{AccrualJob, ReconciliationJob, ReconciliationOptions, RolloverJob, connect_with};
use saldo_shared::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "saldo-jobs")]
#[command(about = "Run Saldo ledger batch jobs", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Post monthly accruals for every employee.
    Accrual {
        /// Year to accrue (default: current year).
        #[arg(long)]
        year: Option<i32>,
        /// Last month to accrue, 1-12 (default: current month).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        through_month: Option<u32>,
    },
    /// Compare the ledger with the leave-request workflow and with itself.
    Reconcile {
        /// Repair missing entries and drifted wallets.
        #[arg(long)]
        auto_fix: bool,
        /// Restrict wallet checks to one year.
        #[arg(long)]
        year: Option<i32>,
        /// Requests repaired per batch.
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Carry leftover balances into the next year.
    Rollover {
        /// Source year (default: previous year).
        #[arg(long)]
        from_year: Option<i32>,
    },
}

impl Command {
    /// Accrual target as `(year, through_month)`, defaulting to `now`.
    fn accrual_period(year: Option<i32>, through_month: Option<u32>, now: DateTime<Utc>) -> (i32, u32) {
        (year.unwrap_or(now.year()), through_month.unwrap_or(now.month()))
    }

    fn rollover_year(from_year: Option<i32>, now: DateTime<Utc>) -> i32 {
        from_year.unwrap_or(now.year() - 1)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let db = connect_with(&config.database).await?;
    let clients = ServiceClients::from_config(&config.services)?;
    let now = Utc::now();

    match cli.command {
        Command::Accrual { year, through_month } => {
            let (year, through_month) = Command::accrual_period(year, through_month, now);
            info!(year, through_month, "Running accrual job");
            let summary = AccrualJob::new(db, clients.contracts).run(year, through_month, now).await?;
            print_summary(&summary)?;
        }
        Command::Reconcile {
            auto_fix,
            year,
            batch_size,
        } => {
            let mut options = ReconciliationOptions::from_config(&config.ledger);
            options.auto_fix |= auto_fix;
            options.year = year;
            if let Some(batch_size) = batch_size {
                options.batch_size = batch_size;
            }
            info!(?options, "Running reconciliation job");
            let report = ReconciliationJob::new(db, clients.leave_requests)
                .run(options, now)
                .await?;
            print_summary(&report)?;
        }
        Command::Rollover { from_year } => {
            let from_year = Command::rollover_year(from_year, now);
            info!(from_year, "Running rollover job");
            let directory: Arc<dyn ContractDirectory> = clients.contracts;
            let summary = RolloverJob::new(db, Some(directory), config.ledger.carryover_months)
                .run(from_year, now)
                .await?;
            print_summary(&summary)?;
        }
    }
    Ok(())
}

fn print_summary<T: Serialize>(summary: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Logs go to stderr so stdout carries only the summary.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "saldo=info".into());
    let json = std::env::var("SALDO_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
