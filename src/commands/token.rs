//! Offline token inspection.

use clap::{Args, Subcommand};
use serde::Serialize;

use warden_auth::TokenDecoder;
use warden_core::config::AppConfig;

use crate::output::{self, OutputFormat};

/// Arguments for `warden token`
#[derive(Debug, Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

/// Token subcommands
#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Verify a token's signature, issuer, kind and expiry
    Verify {
        token: String,
        /// Expect a refresh token instead of an access token
        #[arg(long)]
        refresh: bool,
    },
}

/// JSON envelope for a verified token.
#[derive(Debug, Serialize)]
struct Verified<T> {
    /// Always true; failures exit with an error instead
    valid: bool,
    /// Decoded claims
    claims: T,
}

/// Signature checks only; revocation state lives in the token store.
pub fn execute(args: &TokenArgs, config: &AppConfig, format: OutputFormat) -> anyhow::Result<()> {
    let decoder = TokenDecoder::new(&config.auth);

    match &args.command {
        TokenCommand::Verify { token, refresh: false } => {
            let claims = decoder.verify_access(token)?;
            output::print_record(
                &Verified { valid: true, claims: &claims },
                &[
                    ("kind", "access".to_string()),
                    ("subject", claims.sub.to_string()),
                    ("email", claims.email.clone()),
                    ("role", output::or_dash(claims.role.as_deref())),
                    ("issuer", claims.iss.clone()),
                    ("expires", claims.expires_at().to_rfc3339()),
                ],
                format,
            );
        }
        TokenCommand::Verify { token, refresh: true } => {
            let claims = decoder.verify_refresh(token)?;
            output::print_record(
                &Verified { valid: true, claims: &claims },
                &[
                    ("kind", "refresh".to_string()),
                    ("subject", claims.sub.to_string()),
                    ("token id", claims.jti.clone()),
                    ("issuer", claims.iss.clone()),
                    ("expires", claims.expires_at().to_rfc3339()),
                ],
                format,
            );
        }
    }
    Ok(())
}
