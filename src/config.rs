// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup. Invalid
//! values are reported as [`ConfigError`] and stop the process; nothing is
//! silently defaulted except absent variables.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `DATABASE_PATH` | redb database file | `data/users.redb` |
//! | `AUTH_KEY_ID` | KID of the signing key | `54bb2165-71e1-41a6-af3e-7da4a0e1e2c1` |
//! | `AUTH_PRIVATE_KEY_FILE` | PEM private key (RS*) or secret file (HS*) | `/service/private.pem` |
//! | `AUTH_ALGORITHM` | Token signing algorithm | `RS256` |
//! | `AUTH_TOKEN_TTL_SECS` | Lifetime of login tokens (at most ten years) | `3600` |
//! | `AUTH_JWKS_URL` | Remote JWK Set with extra verification keys | Optional |
//! | `BCRYPT_COST` | bcrypt work factor for new passwords (4 to 31) | `10` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key; both or neither | Optional |
//! | `SHUTDOWN_TIMEOUT_SECS` | Grace period for in-flight requests | `5` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";
pub const AUTH_KEY_ID_ENV: &str = "AUTH_KEY_ID";
pub const AUTH_PRIVATE_KEY_FILE_ENV: &str = "AUTH_PRIVATE_KEY_FILE";
pub const AUTH_ALGORITHM_ENV: &str = "AUTH_ALGORITHM";
pub const AUTH_TOKEN_TTL_ENV: &str = "AUTH_TOKEN_TTL_SECS";
pub const AUTH_JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const BCRYPT_COST_ENV: &str = "BCRYPT_COST";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const SHUTDOWN_TIMEOUT_ENV: &str = "SHUTDOWN_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// KID under which the service's own key is registered.
pub const DEFAULT_KEY_ID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";
pub const DEFAULT_PRIVATE_KEY_FILE: &str = "/service/private.pem";
pub const DEFAULT_ALGORITHM: &str = "RS256";
pub const DEFAULT_DATABASE_PATH: &str = "data/users.redb";

/// bcrypt work factor bounds accepted by the `bcrypt` crate.
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

/// Longest accepted token lifetime (ten years).
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// PEM files for serving HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub key_id: String,
    pub private_key_file: PathBuf,
    pub algorithm: String,
    pub token_ttl: Duration,
    pub jwks_url: Option<String>,
    pub bcrypt_cost: u32,
    pub tls: Option<TlsPaths>,
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to read variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(PORT_ENV, get(PORT_ENV), 3000)?;
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: HOST_ENV,
                value: host.clone(),
                reason: e.to_string(),
            })?;

        let token_ttl_secs: u64 = parse_or(AUTH_TOKEN_TTL_ENV, get(AUTH_TOKEN_TTL_ENV), 3600)?;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&token_ttl_secs) {
            return Err(ConfigError::Invalid {
                name: AUTH_TOKEN_TTL_ENV,
                value: token_ttl_secs.to_string(),
                reason: format!("must be between 1 and {MAX_TOKEN_TTL_SECS}"),
            });
        }

        let bcrypt_cost: u32 = parse_or(BCRYPT_COST_ENV, get(BCRYPT_COST_ENV), bcrypt::DEFAULT_COST)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: BCRYPT_COST_ENV,
                value: bcrypt_cost.to_string(),
                reason: format!("must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}"),
            });
        }

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Pretty,
            Some(f) if f == "pretty" => LogFormat::Pretty,
            Some(f) if f == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    value: other,
                    reason: "expected json or pretty".to_string(),
                })
            }
        };

        Ok(Self {
            bind_addr,
            database_path: get(DATABASE_PATH_ENV)
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string())
                .into(),
            key_id: get(AUTH_KEY_ID_ENV).unwrap_or_else(|| DEFAULT_KEY_ID.to_string()),
            private_key_file: get(AUTH_PRIVATE_KEY_FILE_ENV)
                .unwrap_or_else(|| DEFAULT_PRIVATE_KEY_FILE.to_string())
                .into(),
            algorithm: get(AUTH_ALGORITHM_ENV).unwrap_or_else(|| DEFAULT_ALGORITHM.to_string()),
            token_ttl: Duration::from_secs(token_ttl_secs),
            jwks_url: get(AUTH_JWKS_URL_ENV),
            bcrypt_cost,
            tls,
            shutdown_timeout: Duration::from_secs(parse_or(
                SHUTDOWN_TIMEOUT_ENV,
                get(SHUTDOWN_TIMEOUT_ENV),
                5,
            )?),
            log_format,
        })
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value: raw,
        }),
    }
}
