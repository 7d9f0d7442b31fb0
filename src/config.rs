// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, default values and the typed configuration
//! loaded from them at startup.
//!
//! ## Server (`embedded-wallet` binary)
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `5858` |
//! | `DATA_DIR` | Directory holding the verification database | `./data` |
//! | `API_BASE_URL` | Custody provider API base URL | `https://api.turnkey.com` |
//! | `API_PUBLIC_KEY` | Compressed P-256 public key of the API key (hex) | Optional, checked against the private key |
//! | `API_PRIVATE_KEY` | PKCS#8 PEM of the P-256 API signing key | Required |
//! | `DEFAULT_ORGANIZATION_ID` | Parent organization ID | Required |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key | Optional (plain HTTP when unset) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! ## Client (session controllers)
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_BASE_URL` | Base URL used to build magic links | Required |
//! | `DIRECTORY_URL` | Base URL of the verification service | Required |
//! | `ORGANIZATION_ID` | Parent organization ID | Required |
//! | `RPC_URL` | Chain-data provider JSON-RPC endpoint | Required |
//! | `ALCHEMY_WS_URL` | WebSocket endpoint for pending transactions | Optional |
//! | `COINGECKO_API_KEY` | Price feed API key | Optional |
//! | `PREFERENCES_PATH` | redb file for local preferences | `./data/preferences.redb` |

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server bind address.
pub const HOST_ENV: &str = "HOST";

/// Server bind port.
pub const PORT_ENV: &str = "PORT";

/// Directory for the verification database.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Custody provider API base URL.
pub const API_BASE_URL_ENV: &str = "API_BASE_URL";

/// Hex-encoded compressed public key of the API key.
pub const API_PUBLIC_KEY_ENV: &str = "API_PUBLIC_KEY";

/// PKCS#8 PEM of the P-256 private key used to stamp provider requests.
pub const API_PRIVATE_KEY_ENV: &str = "API_PRIVATE_KEY";

/// Parent organization under which sub-organizations are created.
pub const DEFAULT_ORGANIZATION_ID_ENV: &str = "DEFAULT_ORGANIZATION_ID";

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

/// Logging format selector (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const APP_BASE_URL_ENV: &str = "APP_BASE_URL";
pub const DIRECTORY_URL_ENV: &str = "DIRECTORY_URL";
pub const ORGANIZATION_ID_ENV: &str = "ORGANIZATION_ID";
pub const RPC_URL_ENV: &str = "RPC_URL";
pub const ALCHEMY_WS_URL_ENV: &str = "ALCHEMY_WS_URL";
pub const COINGECKO_API_KEY_ENV: &str = "COINGECKO_API_KEY";
pub const PREFERENCES_PATH_ENV: &str = "PREFERENCES_PATH";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5858;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_API_BASE_URL: &str = "https://api.turnkey.com";
pub const DEFAULT_PREFERENCES_PATH: &str = "./data/preferences.redb";

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    fn parse(raw: Option<String>) -> Result<Self, ConfigError> {
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(LogFormat::default()),
            Some(v) if v.eq_ignore_ascii_case("json") => Ok(LogFormat::Json),
            Some(v) if v.eq_ignore_ascii_case("pretty") => Ok(LogFormat::Pretty),
            Some(other) => Err(ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                reason: format!("expected `json` or `pretty`, got `{other}`"),
            }),
        }
    }
}

/// Credentials and endpoint of the custody provider API.
#[derive(Debug, Clone)]
pub struct CustodyConfig {
    pub api_base_url: String,
    pub api_public_key: Option<String>,
    pub api_private_key_pem: String,
    pub organization_id: String,
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Configuration of the verification service binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub custody: CustodyConfig,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match get(PORT_ENV) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV,
                reason: format!("`{raw}` is not a port number"),
            })?,
            None => DEFAULT_PORT,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let api_base_url = get(API_BASE_URL_ENV).unwrap_or_else(|| DEFAULT_API_BASE_URL.into());
        url::Url::parse(&api_base_url).map_err(|e| ConfigError::Invalid {
            name: API_BASE_URL_ENV,
            reason: e.to_string(),
        })?;

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.into()),
            port,
            data_dir: get(DATA_DIR_ENV)
                .unwrap_or_else(|| DEFAULT_DATA_DIR.into())
                .into(),
            custody: CustodyConfig {
                api_base_url: api_base_url.trim_end_matches('/').to_string(),
                api_public_key: get(API_PUBLIC_KEY_ENV),
                api_private_key_pem: get(API_PRIVATE_KEY_ENV)
                    .ok_or(ConfigError::Missing(API_PRIVATE_KEY_ENV))?,
                organization_id: get(DEFAULT_ORGANIZATION_ID_ENV)
                    .ok_or(ConfigError::Missing(DEFAULT_ORGANIZATION_ID_ENV))?,
            },
            tls,
            log_format: LogFormat::parse(get(LOG_FORMAT_ENV))?,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: HOST_ENV,
                reason: e.to_string(),
            })
    }

    pub fn users_db_path(&self) -> PathBuf {
        self.data_dir.join("users.redb")
    }
}

/// Configuration consumed by the session controllers.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub app_base_url: url::Url,
    pub directory_url: url::Url,
    pub organization_id: String,
    pub rpc_url: url::Url,
    pub ws_url: Option<url::Url>,
    pub coingecko_api_key: Option<String>,
    pub preferences_path: PathBuf,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let url = |name: &'static str, raw: String| {
            url::Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            })
        };
        let required_url = |name: &'static str| {
            get(name)
                .ok_or(ConfigError::Missing(name))
                .and_then(|raw| url(name, raw))
        };

        Ok(Self {
            app_base_url: required_url(APP_BASE_URL_ENV)?,
            directory_url: required_url(DIRECTORY_URL_ENV)?,
            organization_id: get(ORGANIZATION_ID_ENV)
                .ok_or(ConfigError::Missing(ORGANIZATION_ID_ENV))?,
            rpc_url: required_url(RPC_URL_ENV)?,
            ws_url: get(ALCHEMY_WS_URL_ENV)
                .map(|raw| url(ALCHEMY_WS_URL_ENV, raw))
                .transpose()?,
            coingecko_api_key: get(COINGECKO_API_KEY_ENV),
            preferences_path: get(PREFERENCES_PATH_ENV)
                .unwrap_or_else(|| DEFAULT_PREFERENCES_PATH.into())
                .into(),
        })
    }
}
