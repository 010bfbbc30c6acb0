//! Ledger configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LEDGER_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `LEDGER_DB_MAX_CONNECTIONS` - Pool size ceiling (default: 10)
//! - `LEDGER_DB_MIN_CONNECTIONS` - Pool size floor (default: 2)
//! - `LEDGER_DB_ACQUIRE_TIMEOUT_SECS` - Seconds to wait for a connection (default: 10)
//! - `LEDGER_UNKNOWN_ARRIVAL_POLICY` - Where lots without a purchase-order
//!   arrival date sort in FIFO order: `epoch`, `lot-created` or `last` (default: `epoch`)
//! - `LEDGER_ACTOR` - Actor recorded for operator commands (default: `System`)

use std::time::Duration;

use secrecy::SecretString;
use stockroom_core::Actor;
use thiserror::Error;

use crate::services::fulfillment::UnknownArrivalPolicy;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 2;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub url: SecretString,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// Minimum idle connections
    pub min_connections: u32,
    /// How long to wait for a free connection
    pub acquire_timeout: Duration,
}

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Database pool settings
    pub database: DatabaseConfig,
    /// FIFO ordering for lots whose purchase order has no arrival date
    pub unknown_arrival_policy: UnknownArrivalPolicy,
    /// Actor recorded on changes made by operator commands
    pub actor: Actor,
}

impl LedgerConfig {
    /// Load configuration from the process environment (and `.env` if present).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required key is missing or a value fails
    /// to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("LEDGER_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("LEDGER_DATABASE_URL".to_string()))?;

        let max_connections = parse_or_default(
            &lookup,
            "LEDGER_DB_MAX_CONNECTIONS",
            DEFAULT_MAX_CONNECTIONS,
        )?;
        let min_connections = parse_or_default(
            &lookup,
            "LEDGER_DB_MIN_CONNECTIONS",
            DEFAULT_MIN_CONNECTIONS,
        )?;
        if min_connections > max_connections {
            return Err(ConfigError::InvalidEnvVar(
                "LEDGER_DB_MIN_CONNECTIONS".to_string(),
                format!("{min_connections} exceeds max connections {max_connections}"),
            ));
        }
        let acquire_timeout_secs = parse_or_default(
            &lookup,
            "LEDGER_DB_ACQUIRE_TIMEOUT_SECS",
            DEFAULT_ACQUIRE_TIMEOUT_SECS,
        )?;

        let unknown_arrival_policy = lookup("LEDGER_UNKNOWN_ARRIVAL_POLICY")
            .map(|raw| {
                raw.parse::<UnknownArrivalPolicy>().map_err(|e| {
                    ConfigError::InvalidEnvVar("LEDGER_UNKNOWN_ARRIVAL_POLICY".to_string(), e)
                })
            })
            .transpose()?
            .unwrap_or_default();

        let actor = match lookup("LEDGER_ACTOR") {
            Some(raw) => Actor::parse(&raw).map_err(|e| {
                ConfigError::InvalidEnvVar("LEDGER_ACTOR".to_string(), e.to_string())
            })?,
            None => Actor::system(),
        };

        Ok(Self {
            database: DatabaseConfig {
                url,
                max_connections,
                min_connections,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            },
            unknown_arrival_policy,
            actor,
        })
    }
}

/// Parse an optional variable, falling back to a default when unset.
fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            LedgerConfig::from_lookup(lookup_from(&[("LEDGER_DATABASE_URL", "postgres://x")]))
                .unwrap();
        assert_eq!(config.database.url.expose_secret(), "postgres://x");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.min_connections, 2);
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(10));
        assert_eq!(config.unknown_arrival_policy, UnknownArrivalPolicy::Epoch);
        assert_eq!(config.actor, Actor::system());
    }

    #[test]
    fn test_database_url_fallback() {
        let config =
            LedgerConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://fallback")]))
                .unwrap();
        assert_eq!(config.database.url.expose_secret(), "postgres://fallback");
    }

    #[test]
    fn test_missing_database_url() {
        let err = LedgerConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "LEDGER_DATABASE_URL"));
    }

    #[test]
    fn test_overrides() {
        let config = LedgerConfig::from_lookup(lookup_from(&[
            ("LEDGER_DATABASE_URL", "postgres://x"),
            ("LEDGER_DB_MAX_CONNECTIONS", "32"),
            ("LEDGER_DB_MIN_CONNECTIONS", "4"),
            ("LEDGER_UNKNOWN_ARRIVAL_POLICY", "last"),
            ("LEDGER_ACTOR", "night-shift"),
        ]))
        .unwrap();
        assert_eq!(config.database.max_connections, 32);
        assert_eq!(config.database.min_connections, 4);
        assert_eq!(config.unknown_arrival_policy, UnknownArrivalPolicy::Last);
        assert_eq!(config.actor.as_str(), "night-shift");
    }

    #[test]
    fn test_invalid_values() {
        let err = LedgerConfig::from_lookup(lookup_from(&[
            ("LEDGER_DATABASE_URL", "postgres://x"),
            ("LEDGER_DB_MAX_CONNECTIONS", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "LEDGER_DB_MAX_CONNECTIONS"));

        let err = LedgerConfig::from_lookup(lookup_from(&[
            ("LEDGER_DATABASE_URL", "postgres://x"),
            ("LEDGER_UNKNOWN_ARRIVAL_POLICY", "sometimes"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));

        let err = LedgerConfig::from_lookup(lookup_from(&[
            ("LEDGER_DATABASE_URL", "postgres://x"),
            ("LEDGER_DB_MAX_CONNECTIONS", "1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "LEDGER_DB_MIN_CONNECTIONS"));
    }
}
