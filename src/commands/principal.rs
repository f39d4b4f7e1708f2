//! Principal administration commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use warden_auth::PrincipalSnapshot;
use warden_core::config::AppConfig;
use warden_entity::LoginEvent;

use crate::output::{self, OutputFormat};

/// Arguments for `warden principal`
#[derive(Debug, Args)]
pub struct PrincipalArgs {
    #[command(subcommand)]
    pub command: PrincipalCommand,
}

/// Principal subcommands
#[derive(Debug, Subcommand)]
pub enum PrincipalCommand {
    /// List principals
    List {
        /// Only holders of this role
        #[arg(short, long)]
        role: Option<String>,
    },
    /// Allow a disabled principal to sign in again
    Enable { email: String },
    /// Block sign-in and revoke every outstanding session
    Disable { email: String },
    /// Show a principal and its effective access
    Show {
        email: String,
        /// Also list the most recent login events
        #[arg(long, value_name = "N")]
        history: Option<u32>,
    },
    /// List a principal's effective permissions
    Permissions { email: String },
    /// Assign a role by name
    AssignRole { email: String, role: String },
    /// Clear a lockout and reset the failure counter
    Unlock { email: String },
    /// Revoke every outstanding refresh token
    RevokeSessions { email: String },
}

/// Principal row for table output
#[derive(Debug, Serialize, Tabled)]
struct PrincipalRow {
    /// Principal ID
    id: String,
    /// Email
    email: String,
    /// Display name
    name: String,
    /// Role name
    role: String,
    /// Enabled or disabled
    status: &'static str,
    /// Last successful login
    last_login: String,
}

impl From<&PrincipalSnapshot> for PrincipalRow {
    fn from(p: &PrincipalSnapshot) -> Self {
        Self {
            id: p.id.to_string(),
            email: p.email.clone(),
            name: p.name.clone(),
            role: output::or_dash(p.role.as_deref()),
            status: if p.active { "active" } else { "disabled" },
            last_login: output::or_dash(p.last_login_at.map(|t| t.format("%Y-%m-%d %H:%M").to_string())),
        }
    }
}

/// Login event row for table output
#[derive(Debug, Serialize, Tabled)]
struct LoginRow {
    /// When the attempt happened
    at: String,
    /// `password` or the identity provider
    method: String,
    /// Whether the attempt succeeded
    success: bool,
    /// Failure reason, if any
    reason: String,
    /// Client address
    ip_address: String,
}

impl From<&LoginEvent> for LoginRow {
    fn from(e: &LoginEvent) -> Self {
        Self {
            at: e.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            method: e.method.clone(),
            success: e.success,
            reason: output::or_dash(e.failure_reason.as_deref()),
            ip_address: output::or_dash(e.ip_address.as_deref()),
        }
    }
}

/// Effective permission row for table output
#[derive(Debug, Serialize, Tabled)]
struct PermissionRow {
    /// `resource:action`
    permission: String,
}

/// Execute principal commands
pub async fn execute(args: &PrincipalArgs, config: &AppConfig, format: OutputFormat) -> anyhow::Result<()> {
    let manager = super::session_manager(config).await?;

    match &args.command {
        PrincipalCommand::List { role } => {
            let role_id = match role {
                Some(name) => Some(manager.roles().get_role_by_name(name).await?.role.id),
                None => None,
            };
            let rows: Vec<PrincipalRow> = manager
                .list_principals(role_id)
                .await?
                .iter()
                .map(PrincipalRow::from)
                .collect();
            output::print_list(&rows, format);
        }
        PrincipalCommand::Enable { email } => {
            let principal = manager.principal_snapshot_by_email(email).await?;
            manager.set_active(principal.id, true).await?;
            output::print_success(&format!("{email} enabled"));
        }
        PrincipalCommand::Disable { email } => {
            let principal = manager.principal_snapshot_by_email(email).await?;
            manager.set_active(principal.id, false).await?;
            output::print_success(&format!("{email} disabled; sessions revoked"));
        }
        PrincipalCommand::Show { email, history } => {
            let snapshot = manager.principal_snapshot_by_email(email).await?;
            print_snapshot(&snapshot, format);

            if let Some(limit) = history {
                let rows: Vec<LoginRow> = manager
                    .login_history(snapshot.id, *limit)
                    .await?
                    .iter()
                    .map(LoginRow::from)
                    .collect();
                output::print_list(&rows, format);
            }
        }
        PrincipalCommand::Permissions { email } => {
            let snapshot = manager.principal_snapshot_by_email(email).await?;
            let rows: Vec<PermissionRow> = manager
                .effective_permissions(snapshot.id)
                .await?
                .into_iter()
                .map(|permission| PermissionRow { permission })
                .collect();
            output::print_list(&rows, format);
        }
        PrincipalCommand::AssignRole { email, role } => {
            let principal = manager.principal_snapshot_by_email(email).await?;
            let role = manager.roles().get_role_by_name(role).await?.role;
            let snapshot = manager.assign_role(principal.id, role.id).await?;
            output::print_success(&format!("Assigned role '{}' to {email}", role.name));
            print_snapshot(&snapshot, format);
        }
        PrincipalCommand::Unlock { email } => {
            let snapshot = manager.principal_snapshot_by_email(email).await?;
            manager.unlock(snapshot.id).await?;
            output::print_success(&format!("{email} unlocked"));
        }
        PrincipalCommand::RevokeSessions { email } => {
            let snapshot = manager.principal_snapshot_by_email(email).await?;
            let revoked = manager.revoke_all_sessions(snapshot.id).await?;
            output::print_success(&format!("Revoked {revoked} session(s) for {email}"));
        }
    }
    Ok(())
}

fn print_snapshot(snapshot: &PrincipalSnapshot, format: OutputFormat) {
    output::print_record(
        snapshot,
        &[
            ("id", snapshot.id.to_string()),
            ("email", snapshot.email.clone()),
            ("name", snapshot.name.clone()),
            ("role", output::or_dash(snapshot.role.as_deref())),
            ("active", snapshot.active.to_string()),
            ("verified", snapshot.verified.to_string()),
            ("provider", output::or_dash(snapshot.provider.as_deref())),
            ("last login", output::or_dash(snapshot.last_login_at)),
            ("permissions", snapshot.permissions.join(", ")),
        ],
        format,
    );
}
