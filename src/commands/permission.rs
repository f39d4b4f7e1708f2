//! Permission management commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use warden_core::config::AppConfig;
use warden_entity::{NewPermission, Permission};

use crate::output::{self, OutputFormat};

/// Arguments for `warden permission`
#[derive(Debug, Args)]
pub struct PermissionArgs {
    #[command(subcommand)]
    pub command: PermissionCommand,
}

/// Permission subcommands
#[derive(Debug, Subcommand)]
pub enum PermissionCommand {
    /// List permissions
    List {
        /// Only permissions on this resource
        #[arg(short, long)]
        resource: Option<String>,
    },
    /// Create a permission named resource:action
    Create {
        resource: String,
        action: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a permission and every grant of it
    Delete { name: String },
}

/// Permission row for table output
#[derive(Debug, Serialize, Tabled)]
struct PermissionRow {
    /// `resource:action`
    name: String,
    /// Display name
    display_name: String,
    /// Description
    description: String,
    /// Inactive permissions are skipped during resolution
    active: bool,
}

impl From<&Permission> for PermissionRow {
    fn from(p: &Permission) -> Self {
        Self {
            name: p.name.clone(),
            display_name: p.display_name.clone(),
            description: p.description.clone(),
            active: p.active,
        }
    }
}

/// Execute permission commands
pub async fn execute(
    args: &PermissionArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let manager = super::session_manager(config).await?;
    let admin = manager.roles();

    match &args.command {
        PermissionCommand::List { resource } => {
            let rows: Vec<PermissionRow> = admin
                .list_permissions(resource.as_deref())
                .await?
                .iter()
                .map(PermissionRow::from)
                .collect();
            output::print_list(&rows, format);
        }
        PermissionCommand::Create {
            resource,
            action,
            display_name,
            description,
        } => {
            let display_name = display_name
                .clone()
                .unwrap_or_else(|| format!("{resource} {action}"));
            let permission = admin
                .create_permission(NewPermission::scoped(
                    resource,
                    action,
                    display_name,
                    description.clone(),
                ))
                .await?;
            output::print_success(&format!("Permission '{}' created", permission.name));
        }
        PermissionCommand::Delete { name } => {
            let permission = admin.get_permission_by_name(name).await?;
            admin.delete_permission(permission.id).await?;
            output::print_success(&format!("Permission '{name}' deleted"));
        }
    }
    Ok(())
}
