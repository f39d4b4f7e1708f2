//! Default catalog seeding.

use warden_auth::bootstrap_defaults;
use warden_core::config::AppConfig;

use crate::output::{self, OutputFormat};

/// Seed the default catalog
pub async fn execute(config: &AppConfig, format: OutputFormat) -> anyhow::Result<()> {
    let manager = super::session_manager(config).await?;
    let report = bootstrap_defaults(manager.roles()).await?;

    if format == OutputFormat::Json {
        output::print_json(&report);
    } else if report.is_noop() {
        output::print_success("Default catalog already present");
    } else {
        output::print_success(&format!(
            "Created {} permissions and {} roles",
            report.permissions_created.len(),
            report.roles_created.len()
        ));
        for role in &report.roles_created {
            output::print_kv("role", role);
        }
    }
    Ok(())
}
