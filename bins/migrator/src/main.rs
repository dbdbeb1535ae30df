//! Database migration runner for Saldo.
//!
//! Connects with the same layered configuration as the server
//! (`SALDO__DATABASE__URL`, `config/*.toml`).
//!
//! Usage:
//!   migrator up [-n N]     - Run pending migrations
//!   migrator down [-n N]   - Roll back the last N migrations (default 1)
//!   migrator status        - Show migration status
//!   migrator fresh         - Drop all tables and re-run migrations

use clap::{Parser, Subcommand};
use saldo_db::{connect_with, migration::Migrator};
use saldo_shared::AppConfig;
use sea_orm_migration::MigratorTrait;
use tracing::info;

#[derive(Parser)]
#[command(name = "migrator")]
#[command(about = "Schema migrations for the Saldo database")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations.
    Up {
        /// Apply at most this many.
        #[arg(short = 'n', long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations.
    Down {
        /// Number of migrations to roll back.
        #[arg(short = 'n', long, default_value = "1")]
        steps: u32,
    },
    /// Show applied and pending migrations.
    Status,
    /// Drop every table, then apply all migrations.
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "saldo=info,sea_orm_migration=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let db = connect_with(&config.database).await?;

    match cli.command {
        Command::Up { steps } => {
            Migrator::up(&db, steps).await?;
            info!("Migrations applied");
        }
        Command::Down { steps } => {
            Migrator::down(&db, Some(steps)).await?;
            info!(steps, "Migrations rolled back");
        }
        Command::Status => Migrator::status(&db).await?,
        Command::Fresh => {
            Migrator::fresh(&db).await?;
            info!("Database recreated");
        }
    }
    Ok(())
}
