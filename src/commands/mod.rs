//! Command definitions and dispatch.

pub mod bootstrap;
pub mod migrate;
pub mod permission;
pub mod principal;
pub mod role;
pub mod token;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use warden_auth::SessionManager;
use warden_cache::StoreManager;
use warden_core::config::AppConfig;
use warden_database::{DatabasePool, Directory};

use crate::output::OutputFormat;

/// Warden: credential lifecycle and access control administration
#[derive(Debug, Parser)]
#[command(name = "warden", version, about, long_about = None)]
pub struct Cli {
    /// Base configuration file
    #[arg(short, long, default_value = "config/default.toml", env = "WARDEN_CONFIG")]
    pub config: String,

    /// Environment overlay loaded from config/{env}.toml
    #[arg(short, long, default_value = "development", env = "WARDEN_ENV")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply or inspect database migrations
    Migrate(migrate::MigrateArgs),
    /// Seed the default permissions and roles
    Bootstrap,
    /// Role management
    Role(role::RoleArgs),
    /// Permission management
    Permission(permission::PermissionArgs),
    /// Principal administration
    Principal(principal::PrincipalArgs),
    /// Token inspection
    Token(token::TokenArgs),
}

impl Cli {
    pub async fn execute(&self, config: AppConfig) -> anyhow::Result<()> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &config, self.format).await,
            Commands::Bootstrap => bootstrap::execute(&config, self.format).await,
            Commands::Role(args) => role::execute(args, &config, self.format).await,
            Commands::Permission(args) => permission::execute(args, &config, self.format).await,
            Commands::Principal(args) => principal::execute(args, &config, self.format).await,
            Commands::Token(args) => token::execute(args, &config, self.format),
        }
    }
}

/// Open the directory database.
pub async fn connect_database(config: &AppConfig) -> anyhow::Result<DatabasePool> {
    DatabasePool::connect(&config.database)
        .await
        .context("Directory database is unreachable")
}

/// Wire a session manager against the configured directory and store.
pub async fn session_manager(config: &AppConfig) -> anyhow::Result<SessionManager> {
    let db = connect_database(config).await?;
    let store = StoreManager::new(&config.store)
        .await
        .context("Token store is unreachable")?;

    SessionManager::new(config, Directory::postgres(&db), Arc::new(store))
        .context("Failed to initialise session manager")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_create_collects_permissions() {
        let cli = Cli::try_parse_from([
            "warden", "role", "create", "auditor", "-p", "audit:read", "-p", "users:read",
        ])
        .unwrap();
        match cli.command {
            Commands::Role(role::RoleArgs {
                command: role::RoleCommand::Create { name, permissions, .. },
            }) => {
                assert_eq!(name, "auditor");
                assert_eq!(permissions, ["audit:read", "users:read"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_grant_requires_a_permission() {
        assert!(Cli::try_parse_from(["warden", "role", "grant", "user"]).is_err());
    }

    #[test]
    fn test_json_format_and_kebab_subcommands() {
        let cli = Cli::try_parse_from([
            "warden", "--format", "json", "principal", "assign-role", "a@x.io", "admin",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Principal(principal::PrincipalArgs {
                command: principal::PrincipalCommand::AssignRole { .. }
            })
        ));
    }

    #[test]
    fn test_principal_list_and_disable() {
        let cli = Cli::try_parse_from(["warden", "principal", "list", "-r", "moderator"]).unwrap();
        match cli.command {
            Commands::Principal(principal::PrincipalArgs {
                command: principal::PrincipalCommand::List { role },
            }) => assert_eq!(role.as_deref(), Some("moderator")),
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["warden", "principal", "disable", "a@x.io"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Principal(principal::PrincipalArgs {
                command: principal::PrincipalCommand::Disable { .. }
            })
        ));
        assert!(Cli::try_parse_from(["warden", "principal", "enable"]).is_err());
    }

    #[test]
    fn test_token_verify_defaults_to_access() {
        let cli = Cli::try_parse_from(["warden", "token", "verify", "abc"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Token(token::TokenArgs {
                command: token::TokenCommand::Verify { refresh: false, .. }
            })
        ));
    }
}
