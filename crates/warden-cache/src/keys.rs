//! Store key builders for every Warden store entry.
//!
//! Centralising key construction prevents typos and makes it easy
//! to find every key the engine uses. Backend prefixes are applied by
//! the backend, not here.

use uuid::Uuid;

// ── Refresh tokens ─────────────────────────────────────────

/// Revocation record for one refresh token.
pub fn refresh_token(principal_id: Uuid, token_id: &str) -> String {
    format!("refresh_token:{principal_id}:{token_id}")
}

/// Set of refresh token ids currently valid for a principal.
pub fn principal_tokens(principal_id: Uuid) -> String {
    format!("user_tokens:{principal_id}")
}

// ── Rate limiting ──────────────────────────────────────────

/// Fixed-window request counter for an identity on a route.
pub fn rate_limit(route: &str, identity: &str) -> String {
    format!("rate_limit:{route}:{}", identity.to_lowercase())
}

// ── OAuth ──────────────────────────────────────────────────

/// One-time OAuth state.
pub fn oauth_state(state: &str) -> String {
    format!("oauth_state:{state}")
}

// ── Sessions ───────────────────────────────────────────────

/// Cached session snapshot for a principal.
pub fn principal_session(principal_id: Uuid) -> String {
    format!("user_session:{principal_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_identity_is_case_folded() {
        assert_eq!(
            rate_limit("login", "Alice@Example.com"),
            "rate_limit:login:alice@example.com"
        );
    }

    #[test]
    fn test_refresh_token_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            refresh_token(id, "abc"),
            "refresh_token:00000000-0000-0000-0000-000000000000:abc"
        );
    }
}
