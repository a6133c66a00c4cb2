//! Typed runtime configuration, loaded once at startup from environment
//! variables (optionally hydrated from a `.env` file by the caller).

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub turso_auth_token: Option<String>,
    pub port: u16,
    /// HMAC secret for impersonation-link tokens (§6). Distinct from any
    /// per-account secret; rotating it invalidates every outstanding link.
    pub impersonation_secret: Vec<u8>,
    pub session_ttl: chrono::Duration,
    pub impersonation_ttl: chrono::Duration,
    pub claim_timeout: Duration,
    /// Default validity window for a freshly minted bootstrap token (§3:
    /// "expires after a bounded horizon (default 7 days)").
    pub bootstrap_token_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let turso_auth_token = env::var("TURSO_AUTH_TOKEN").ok();

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let impersonation_secret = env::var("IMPERSONATION_SECRET")
            .unwrap_or_else(|_| "dev-impersonation-secret-do-not-use-in-production".to_string())
            .into_bytes();

        let session_ttl_hours: i64 = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24 * 7);

        let bootstrap_token_ttl_days: i64 = env::var("BOOTSTRAP_TOKEN_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7);

        Ok(Self {
            database_url,
            turso_auth_token,
            port,
            impersonation_secret,
            session_ttl: chrono::Duration::hours(session_ttl_hours),
            impersonation_ttl: chrono::Duration::minutes(5),
            claim_timeout: Duration::from_secs(10),
            bootstrap_token_ttl: chrono::Duration::days(bootstrap_token_ttl_days),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_database_url_is_an_error() {
        std::env::remove_var("DATABASE_URL");
        assert!(Config::from_env().is_err());
    }
}
