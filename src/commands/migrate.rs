//! Database migration commands.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use warden_core::config::AppConfig;
use warden_database::migration::{self, MigrationStatus};

use crate::output::{self, OutputFormat};

/// Arguments for `warden migrate`
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Show applied and pending migrations instead of applying them
    #[arg(long)]
    pub status: bool,
}

/// Migration row for table output
#[derive(Debug, Serialize, Tabled)]
struct MigrationRow {
    /// Migration version
    version: i64,
    /// Description
    description: String,
    /// Applied or pending
    state: &'static str,
}

impl From<MigrationStatus> for MigrationRow {
    fn from(m: MigrationStatus) -> Self {
        Self {
            version: m.version,
            description: m.description,
            state: if m.applied { "applied" } else { "pending" },
        }
    }
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config: &AppConfig, format: OutputFormat) -> anyhow::Result<()> {
    let db = super::connect_database(config).await?;

    if args.status {
        let rows: Vec<MigrationRow> = migration::migration_status(&db)
            .await?
            .into_iter()
            .map(MigrationRow::from)
            .collect();
        output::print_list(&rows, format);
    } else {
        migration::run_migrations(&db).await?;
        output::print_success("Migrations applied");
    }

    db.close().await;
    Ok(())
}
