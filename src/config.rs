// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the [`AppConfig`] loaded from
//! them at startup. Any invalid value aborts startup before the listener is
//! bound.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `auth.redb` | `./data` |
//! | `JWT_SECRET` | HMAC signing secret, at least 32 bytes | Required |
//! | `ACCESS_TOKEN_TTL_SECS` | Access token lifetime | `3600` |
//! | `REFRESH_TOKEN_TTL_SECS` | Refresh token lifetime | `604800` |
//! | `GEMINI_API_KEY` | Insight service key; insights disabled if unset | Optional |
//! | `GEMINI_API_URL` | Insight service base URL | Google `v1beta` endpoint |
//! | `GEMINI_MODEL` | Insight model name | `gemini-1.5-pro` |
//! | `MAX_UPLOAD_BYTES` | Upload body limit for audio | `26214400` (25 MiB) |
//! | `BOOTSTRAP_ADMIN_USERNAME` | Admin account ensured at startup | Optional |
//! | `BOOTSTRAP_ADMIN_EMAIL` | Email for the bootstrap admin | Required with username |
//! | `BOOTSTRAP_ADMIN_PASSWORD` | Password for the bootstrap admin | Required with username |
//! | `TLS_CERT_PATH` | PEM certificate chain; enables HTTPS | Optional |
//! | `TLS_KEY_PATH` | PEM private key | Required with cert |
//! | `CORS_ALLOWED_ORIGINS` | Comma-separated browser origins; any origin if unset | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use axum::http::HeaderValue;
use chrono::Duration;

use crate::auth::{SigningKey, TokenLifetimes};
use crate::providers::gemini;
use crate::storage::DATABASE_FILE;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const ACCESS_TOKEN_TTL_ENV: &str = "ACCESS_TOKEN_TTL_SECS";
pub const REFRESH_TOKEN_TTL_ENV: &str = "REFRESH_TOKEN_TTL_SECS";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const GEMINI_API_URL_ENV: &str = "GEMINI_API_URL";
pub const GEMINI_MODEL_ENV: &str = "GEMINI_MODEL";
pub const MAX_UPLOAD_BYTES_ENV: &str = "MAX_UPLOAD_BYTES";
pub const BOOTSTRAP_ADMIN_USERNAME_ENV: &str = "BOOTSTRAP_ADMIN_USERNAME";
pub const BOOTSTRAP_ADMIN_EMAIL_ENV: &str = "BOOTSTRAP_ADMIN_EMAIL";
pub const BOOTSTRAP_ADMIN_PASSWORD_ENV: &str = "BOOTSTRAP_ADMIN_PASSWORD";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const CORS_ALLOWED_ORIGINS_ENV: &str = "CORS_ALLOWED_ORIGINS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3600;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 3600;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Fully validated runtime configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub data_dir: PathBuf,
    pub signing_key: SigningKey,
    pub token_lifetimes: TokenLifetimes,
    pub gemini: Option<GeminiConfig>,
    pub max_upload_bytes: usize,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub tls: Option<TlsPaths>,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<HeaderValue>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr())
            .field("data_dir", &self.data_dir)
            .field("token_lifetimes", &self.token_lifetimes)
            .field("insights_enabled", &self.gemini.is_some())
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("bootstrap_admin", &self.bootstrap_admin.as_ref().map(|a| &a.username))
            .field("tls", &self.tls)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host: IpAddr = match get(HOST_ENV) {
            Some(raw) => parse(HOST_ENV, &raw)?,
            None => parse(HOST_ENV, DEFAULT_HOST)?,
        };
        let port = get(PORT_ENV)
            .map(|raw| parse(PORT_ENV, &raw))
            .transpose()?
            .unwrap_or(DEFAULT_PORT);
        let data_dir = PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()));

        let secret = lookup(JWT_SECRET_ENV)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?;
        let signing_key = SigningKey::new(secret.as_bytes()).map_err(|e| ConfigError::Invalid {
            name: JWT_SECRET_ENV,
            reason: e.to_string(),
        })?;

        let token_lifetimes = TokenLifetimes {
            access: ttl(get(ACCESS_TOKEN_TTL_ENV), ACCESS_TOKEN_TTL_ENV, DEFAULT_ACCESS_TOKEN_TTL_SECS)?,
            refresh: ttl(get(REFRESH_TOKEN_TTL_ENV), REFRESH_TOKEN_TTL_ENV, DEFAULT_REFRESH_TOKEN_TTL_SECS)?,
        };

        let gemini = get(GEMINI_API_KEY_ENV).map(|api_key| GeminiConfig {
            api_key,
            api_url: get(GEMINI_API_URL_ENV).unwrap_or_else(|| gemini::DEFAULT_API_URL.to_string()),
            model: get(GEMINI_MODEL_ENV).unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string()),
        });

        let max_upload_bytes = get(MAX_UPLOAD_BYTES_ENV)
            .map(|raw| parse::<usize>(MAX_UPLOAD_BYTES_ENV, &raw))
            .transpose()?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                name: MAX_UPLOAD_BYTES_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        let bootstrap_admin = match get(BOOTSTRAP_ADMIN_USERNAME_ENV) {
            Some(username) => Some(BootstrapAdmin {
                username,
                email: get(BOOTSTRAP_ADMIN_EMAIL_ENV)
                    .ok_or(ConfigError::Missing(BOOTSTRAP_ADMIN_EMAIL_ENV))?,
                password: lookup(BOOTSTRAP_ADMIN_PASSWORD_ENV)
                    .filter(|v| !v.is_empty())
                    .ok_or(ConfigError::Missing(BOOTSTRAP_ADMIN_PASSWORD_ENV))?,
            }),
            None => None,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let cors_allowed_origins = get(CORS_ALLOWED_ORIGINS_ENV)
            .map(|raw| cors_origins(&raw))
            .transpose()?
            .unwrap_or_default();

        let log_format = match get(LOG_FORMAT_ENV).as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    reason: format!("expected `json` or `pretty`, got `{other}`"),
                })
            }
        };

        Ok(Self {
            host,
            port,
            data_dir,
            signing_key,
            token_lifetimes,
            gemini,
            max_upload_bytes,
            bootstrap_admin,
            tls,
            cors_allowed_origins,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

fn parse<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn ttl(raw: Option<String>, name: &'static str, default_secs: i64) -> Result<Duration, ConfigError> {
    let secs = match raw {
        Some(raw) => parse::<i64>(name, &raw)?,
        None => default_secs,
    };
    if secs <= 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be a positive number of seconds".to_string(),
        });
    }
    Ok(Duration::seconds(secs))
}

fn cors_origins(raw: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            let url = url::Url::parse(origin).map_err(|e| ConfigError::Invalid {
                name: CORS_ALLOWED_ORIGINS_ENV,
                reason: format!("`{origin}`: {e}"),
            })?;
            // Browsers send the bare origin, without path or trailing slash.
            HeaderValue::from_str(&url.origin().ascii_serialization()).map_err(|e| {
                ConfigError::Invalid {
                    name: CORS_ALLOWED_ORIGINS_ENV,
                    reason: format!("`{origin}`: {e}"),
                }
            })
        })
        .collect()
}
