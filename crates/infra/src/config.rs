//! Configuration loading and representation.
//!
//! Everything is read from environment variables. `from_lookup` takes the
//! lookup function explicitly so that parsing is testable without touching the
//! process environment.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use bank_core::MAX_TIMEOUT_MS;

use crate::ledger_store::TransferLocking;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DEADLINE_MS: u64 = 5_000;
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Postgres connection settings. Absent `DATABASE_URL` means in-memory mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub bind_addr: SocketAddr,
    pub database: Option<DatabaseConfig>,
    pub default_deadline: Duration,
    pub transfer_locking: TransferLocking,
    pub jwt_secret: String,
    /// True when `JWT_SECRET` was not provided and the dev default is in use.
    pub insecure_jwt_secret: bool,
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let default_deadline_ms =
            parse_or(&lookup, "LEDGER_DEFAULT_DEADLINE_MS", DEFAULT_DEADLINE_MS)?;
        if default_deadline_ms == 0 || default_deadline_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Invalid {
                key: "LEDGER_DEFAULT_DEADLINE_MS",
                reason: format!("must be between 1 and {MAX_TIMEOUT_MS}"),
            });
        }
        let default_deadline = Duration::from_millis(default_deadline_ms);

        let transfer_locking = match lookup("LEDGER_TRANSFER_LOCKING") {
            Some(v) => v.parse::<TransferLocking>().map_err(|reason| ConfigError::Invalid {
                key: "LEDGER_TRANSFER_LOCKING",
                reason,
            })?,
            None => TransferLocking::default(),
        };

        let database = match lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            Some(url) => {
                let max_connections =
                    parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
                if max_connections == 0 {
                    return Err(ConfigError::Invalid {
                        key: "DATABASE_MAX_CONNECTIONS",
                        reason: "must be at least 1".to_string(),
                    });
                }
                Some(DatabaseConfig {
                    url,
                    max_connections,
                    acquire_timeout: default_deadline,
                })
            }
            None => None,
        };

        let (jwt_secret, insecure_jwt_secret) = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => (secret, false),
            _ => (DEV_JWT_SECRET.to_string(), true),
        };

        Ok(Self {
            bind_addr,
            database,
            default_deadline,
            transfer_locking,
            jwt_secret,
            insecure_jwt_secret,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
