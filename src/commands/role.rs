//! Role management commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use warden_auth::rbac::{RoleAdmin, RoleDraft};
use warden_auth::RoleDetails;
use warden_core::config::AppConfig;
use warden_entity::Role;

use crate::output::{self, OutputFormat};

/// Arguments for `warden role`
#[derive(Debug, Args)]
pub struct RoleArgs {
    #[command(subcommand)]
    pub command: RoleCommand,
}

/// Role subcommands
#[derive(Debug, Subcommand)]
pub enum RoleCommand {
    /// List all roles
    List,
    /// Show a role and its permissions
    Show { name: String },
    /// Create a role
    Create {
        name: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        /// Permission to grant, as resource:action (repeatable)
        #[arg(short, long = "permission")]
        permissions: Vec<String>,
    },
    /// Delete a role that no principal holds
    Delete { name: String },
    /// Grant permissions to a role
    Grant {
        name: String,
        #[arg(required = true)]
        permissions: Vec<String>,
    },
    /// Revoke permissions from a role
    Revoke {
        name: String,
        #[arg(required = true)]
        permissions: Vec<String>,
    },
}

/// Role row for table output
#[derive(Debug, Serialize, Tabled)]
struct RoleRow {
    /// Role ID
    id: String,
    /// Machine name
    name: String,
    /// Display name
    display_name: String,
    /// Inactive roles grant nothing
    active: bool,
    /// Created at
    created_at: String,
}

impl From<&Role> for RoleRow {
    fn from(r: &Role) -> Self {
        Self {
            id: r.id.to_string(),
            name: r.name.clone(),
            display_name: r.display_name.clone(),
            active: r.active,
            created_at: r.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Execute role commands
pub async fn execute(args: &RoleArgs, config: &AppConfig, format: OutputFormat) -> anyhow::Result<()> {
    let manager = super::session_manager(config).await?;
    let admin = manager.roles();

    match &args.command {
        RoleCommand::List => {
            let rows: Vec<RoleRow> = admin.list_roles().await?.iter().map(RoleRow::from).collect();
            output::print_list(&rows, format);
        }
        RoleCommand::Show { name } => {
            let details = admin.get_role_by_name(name).await?;
            print_details(&details, format);
        }
        RoleCommand::Create {
            name,
            display_name,
            description,
            permissions,
        } => {
            let permission_ids = permission_ids(admin, permissions).await?;
            let details = admin
                .create_role(RoleDraft {
                    name: name.clone(),
                    display_name: display_name.clone().unwrap_or_else(|| name.clone()),
                    description: description.clone(),
                    permission_ids,
                })
                .await?;
            output::print_success(&format!("Role '{}' created", details.role.name));
            print_details(&details, format);
        }
        RoleCommand::Delete { name } => {
            let role = admin.get_role_by_name(name).await?.role;
            admin.delete_role(role.id).await?;
            output::print_success(&format!("Role '{name}' deleted"));
        }
        RoleCommand::Grant { name, permissions } => {
            let role = admin.get_role_by_name(name).await?.role;
            let ids = permission_ids(admin, permissions).await?;
            admin.assign_permissions(role.id, &ids).await?;
            output::print_success(&format!("Granted {} permission(s) to '{name}'", ids.len()));
        }
        RoleCommand::Revoke { name, permissions } => {
            let role = admin.get_role_by_name(name).await?.role;
            let ids = permission_ids(admin, permissions).await?;
            admin.remove_permissions(role.id, &ids).await?;
            output::print_success(&format!("Revoked {} permission(s) from '{name}'", ids.len()));
        }
    }
    Ok(())
}

/// Resolve `resource:action` names to permission ids.
async fn permission_ids(admin: &RoleAdmin, names: &[String]) -> anyhow::Result<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let permission = admin
            .get_permission_by_name(name)
            .await
            .map_err(|e| anyhow::anyhow!("{name}: {e}"))?;
        ids.push(permission.id);
    }
    Ok(ids)
}

fn print_details(details: &RoleDetails, format: OutputFormat) {
    let granted: Vec<&str> = details.permissions.iter().map(|p| p.name.as_str()).collect();
    output::print_record(
        details,
        &[
            ("id", details.role.id.to_string()),
            ("name", details.role.name.clone()),
            ("display name", details.role.display_name.clone()),
            ("description", details.role.description.clone()),
            ("active", details.role.active.to_string()),
            ("permissions", granted.join(", ")),
        ],
        format,
    );
}
