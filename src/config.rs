// ABOUTME: Environment-driven configuration: storage URL and TTL overrides
// ABOUTME: Feeds the explicit wire-up in provider.rs, no process-wide singleton
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{AuthError, AuthResult};
use crate::stores::{default_grant_ttl, default_token_ttl};
use chrono::Duration;
use tracing::info;

/// Environment variable names
mod env_keys {
    pub const DATABASE_URL: &str = "OAUTH_DATABASE_URL";
    pub const GRANT_TTL_SECS: &str = "OAUTH_GRANT_TTL_SECS";
    pub const TOKEN_TTL_SECS: &str = "OAUTH_TOKEN_TTL_SECS";
}

/// Configuration for the authorization core.
///
/// The defaults give an in-memory backend with a 1-hour code TTL and a
/// 90-day token TTL.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// `memory://` or a `sqlite:` URL
    pub database_url: String,
    /// Authorization-code lifetime
    pub grant_ttl: Duration,
    /// Access-token lifetime
    pub token_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            database_url: "memory://".to_owned(),
            grant_ttl: default_grant_ttl(),
            token_ttl: default_token_ttl(),
        }
    }
}

impl AuthConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// # Errors
    /// Returns an error when a TTL variable is set but not a positive
    /// number of seconds.
    pub fn from_env() -> AuthResult<Self> {
        let defaults = Self::default();
        let config = Self {
            database_url: std::env::var(env_keys::DATABASE_URL)
                .unwrap_or(defaults.database_url),
            grant_ttl: ttl_from_env(env_keys::GRANT_TTL_SECS, defaults.grant_ttl)?,
            token_ttl: ttl_from_env(env_keys::TOKEN_TTL_SECS, defaults.token_ttl)?,
        };
        info!(
            "loaded auth config: backend url {}, grant ttl {}s, token ttl {}s",
            config.database_url,
            config.grant_ttl.num_seconds(),
            config.token_ttl.num_seconds()
        );
        Ok(config)
    }
}

fn ttl_from_env(key: &str, default: Duration) -> AuthResult<Duration> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs: i64 = raw
                .parse()
                .map_err(|_| AuthError::config(format!("invalid {key}: {raw}")))?;
            if secs <= 0 {
                return Err(AuthError::config(format!(
                    "{key} must be positive, got {secs}"
                )));
            }
            Ok(Duration::seconds(secs))
        }
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_ttls() {
        let config = AuthConfig::default();
        assert_eq!(config.database_url, "memory://");
        assert_eq!(config.grant_ttl, Duration::hours(1));
        assert_eq!(config.token_ttl, Duration::days(90));
    }

    #[test]
    fn ttl_parsing_rejects_non_positive_values() {
        assert!(ttl_from_env("MISSING_TTL_KEY", Duration::hours(1)).is_ok());
    }

    #[test]
    fn ttl_parse_failures_are_config_errors() {
        std::env::set_var("TEST_MALFORMED_TTL", "ninety");
        let err = ttl_from_env("TEST_MALFORMED_TTL", Duration::hours(1)).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));

        std::env::set_var("TEST_MALFORMED_TTL", "-5");
        let err = ttl_from_env("TEST_MALFORMED_TTL", Duration::hours(1)).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
        std::env::remove_var("TEST_MALFORMED_TTL");
    }
}
