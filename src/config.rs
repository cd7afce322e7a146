//! Process configuration loaded from environment variables

use std::net::SocketAddr;
use thiserror::Error;

use crate::db::is_valid_table_name;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("Invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Log output format for the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Table holding the readings
    pub table: String,
    /// Upper bound on pooled connections
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub database: DatabaseConfig,
    pub log_format: LogFormat,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "LISTEN_ADDR",
                message: e.to_string(),
            })?;

        let url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let table = lookup("READINGS_TABLE").unwrap_or_else(|| "readings".to_string());
        if !is_valid_table_name(&table) {
            return Err(ConfigError::Invalid {
                key: "READINGS_TABLE",
                message: format!("'{}' is not a plain table identifier", table),
            });
        }

        let max_connections: u32 = lookup("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ConfigError::Invalid {
                key: "DB_MAX_CONNECTIONS",
                message: "expected a positive integer".to_string(),
            })?;

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    message: format!("'{}' (expected text or json)", other),
                })
            }
        };

        Ok(Self {
            listen_addr,
            database: DatabaseConfig {
                url,
                table,
                max_connections,
            },
            log_format,
        })
    }
}
