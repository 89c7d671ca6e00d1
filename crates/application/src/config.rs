//! Configuration for the authentication core (C7/C8/C9): `dotenvy::dotenv()` followed by a
//! `config::Config` builder reading `AUTH_*` environment variables into a typed struct. Every key
//! with a sensible default falls back to it via `serde(default = ...)`; `frontend_url`,
//! `jwt_signing_key`, and `email_default_from` have none and fail `from_env` with a
//! `config::ConfigError` when absent.
use config::ConfigError;
use serde::Deserialize;
use std::time::Duration;

fn default_jwt_access_lifetime_secs() -> i64 {
    15 * 60
}

fn default_jwt_refresh_lifetime_secs() -> i64 {
    24 * 60 * 60
}

fn default_password_reset_expiry_secs() -> i64 {
    30 * 60
}

fn default_password_reset_rate_limit_window_secs() -> i64 {
    60 * 60
}

fn default_password_reset_rate_limit_threshold() -> i32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_invitation_expiry_secs() -> i64 {
    48 * 60 * 60
}

fn default_max_sessions_per_account() -> i64 {
    5
}

fn default_email_retry_backoff() -> String {
    "1,5,15".to_string()
}

fn default_email_max_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub frontend_url: String,
    pub jwt_signing_key: String,
    pub email_default_from: String,

    #[serde(default = "default_jwt_access_lifetime_secs")]
    pub jwt_access_lifetime_secs: i64,
    #[serde(default = "default_jwt_refresh_lifetime_secs")]
    pub jwt_refresh_lifetime_secs: i64,
    #[serde(default = "default_password_reset_expiry_secs")]
    pub password_reset_expiry_secs: i64,
    #[serde(default = "default_password_reset_rate_limit_window_secs")]
    pub password_reset_rate_limit_window_secs: i64,
    #[serde(default = "default_password_reset_rate_limit_threshold")]
    pub password_reset_rate_limit_threshold: i32,
    #[serde(default = "default_true")]
    pub password_reset_rate_limit_enabled: bool,
    #[serde(default = "default_invitation_expiry_secs")]
    pub invitation_expiry_secs: i64,
    #[serde(default = "default_max_sessions_per_account")]
    pub max_sessions_per_account: i64,
    /// Comma-separated seconds, e.g. `"1,5,15"`. Parsed by [`AuthConfig::email_retry_backoff`].
    #[serde(default = "default_email_retry_backoff")]
    pub email_retry_backoff: String,
    #[serde(default = "default_email_max_attempts")]
    pub email_max_attempts: u32,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("AUTH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let cfg: Self = cfg.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `JwtService` signs with HMAC, which accepts a key of any length; this is the load-time
    /// check that makes a too-short `jwt_signing_key` a config error instead of a silently weak
    /// signature, per spec.md §6's "≥32 bytes, required".
    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_signing_key.len() < 32 {
            return Err(ConfigError::Message(format!(
                "jwt_signing_key must be at least 32 bytes, got {}",
                self.jwt_signing_key.len()
            )));
        }
        Ok(())
    }

    pub fn jwt_access_lifetime(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.jwt_access_lifetime_secs)
    }

    pub fn jwt_refresh_lifetime(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.jwt_refresh_lifetime_secs)
    }

    pub fn password_reset_expiry(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.password_reset_expiry_secs)
    }

    pub fn password_reset_rate_limit_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.password_reset_rate_limit_window_secs)
    }

    pub fn invitation_expiry(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.invitation_expiry_secs)
    }

    pub fn email_retry_backoff(&self) -> Vec<Duration> {
        self.email_retry_backoff
            .split(',')
            .filter_map(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthConfig {
        AuthConfig {
            frontend_url: "https://app.example.com".to_string(),
            jwt_signing_key: "x".repeat(32),
            email_default_from: "noreply@example.com".to_string(),
            jwt_access_lifetime_secs: default_jwt_access_lifetime_secs(),
            jwt_refresh_lifetime_secs: default_jwt_refresh_lifetime_secs(),
            password_reset_expiry_secs: default_password_reset_expiry_secs(),
            password_reset_rate_limit_window_secs: default_password_reset_rate_limit_window_secs(),
            password_reset_rate_limit_threshold: default_password_reset_rate_limit_threshold(),
            password_reset_rate_limit_enabled: default_true(),
            invitation_expiry_secs: default_invitation_expiry_secs(),
            max_sessions_per_account: default_max_sessions_per_account(),
            email_retry_backoff: default_email_retry_backoff(),
            email_max_attempts: default_email_max_attempts(),
        }
    }

    #[test]
    fn parses_backoff_sequence() {
        let cfg = sample();
        assert_eq!(
            cfg.email_retry_backoff(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(15)
            ]
        );
    }

    #[test]
    fn defaults_match_spec() {
        let cfg = sample();
        assert_eq!(cfg.jwt_access_lifetime(), chrono::Duration::minutes(15));
        assert_eq!(cfg.jwt_refresh_lifetime(), chrono::Duration::hours(24));
        assert_eq!(cfg.max_sessions_per_account, 5);
        assert_eq!(cfg.password_reset_rate_limit_threshold, 3);
    }

    #[test]
    fn validate_accepts_a_32_byte_key() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_a_short_signing_key() {
        let mut cfg = sample();
        cfg.jwt_signing_key = "too-short".to_string();
        assert!(cfg.validate().is_err());
    }
}
