//! Server configuration.

use std::env;
use std::path::PathBuf;

use actix_web::cookie::Key;
use chrono::Duration;

use crate::errors::AppError;

/// Configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Cookie signing key material, at least 64 bytes.
    pub session_key: Option<String>,
    /// Whether the session cookie is marked `Secure`.
    pub cookie_secure: bool,
    /// Consecutive failed logins before the account locks.
    pub max_login_attempts: i64,
    /// Lockout window in minutes.
    pub lock_minutes: i64,
    /// Prefix for amounts in the exported report.
    pub currency_symbol: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: PathBuf::from("instance/expenses.db"),
            session_key: None,
            cookie_secure: false,
            max_login_attempts: 3,
            lock_minutes: 5,
            currency_symbol: "Rs.".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("EXPENSES_HOST").unwrap_or(defaults.host),
            port: parse_var("EXPENSES_PORT").unwrap_or(defaults.port),
            database_path: env::var("EXPENSES_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            session_key: env::var("SESSION_KEY").ok().filter(|k| !k.is_empty()),
            cookie_secure: env::var("EXPENSES_COOKIE_SECURE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(defaults.cookie_secure),
            max_login_attempts: parse_var("EXPENSES_MAX_LOGIN_ATTEMPTS")
                .filter(|n: &i64| *n > 0)
                .unwrap_or(defaults.max_login_attempts),
            lock_minutes: parse_var("EXPENSES_LOCK_MINUTES")
                .filter(|n: &i64| *n >= 0 && Duration::try_minutes(*n).is_some())
                .unwrap_or(defaults.lock_minutes),
            currency_symbol: env::var("EXPENSES_CURRENCY").unwrap_or(defaults.currency_symbol),
        }
    }

    pub fn server_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    /// Builds the cookie key. Without `SESSION_KEY` a random key is used and
    /// sessions do not survive a restart.
    pub fn cookie_key(&self) -> Result<Key, AppError> {
        match &self.session_key {
            Some(raw) => Key::try_from(raw.as_bytes()).map_err(|_| {
                AppError::Config("SESSION_KEY must be at least 64 bytes long".to_string())
            }),
            None => {
                log::warn!("SESSION_KEY not set, generating a random session key");
                Ok(Key::generate())
            }
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_lockout_rules() {
        let config = Config::default();
        assert_eq!(config.max_login_attempts, 3);
        assert_eq!(config.lock_minutes, 5);
        assert_eq!(config.database_path, PathBuf::from("instance/expenses.db"));
    }

    #[test]
    fn short_session_key_is_rejected() {
        let config = Config {
            session_key: Some("too-short".into()),
            ..Config::default()
        };
        assert!(matches!(config.cookie_key(), Err(AppError::Config(_))));

        let config = Config {
            session_key: Some("k".repeat(64)),
            ..Config::default()
        };
        assert!(config.cookie_key().is_ok());
    }
}
