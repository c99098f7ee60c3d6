// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process startup: logging, storage, role seeding and the HTTP listener.
//!
//! Every step before [`serve`] binds the socket is fatal on failure, so a
//! misconfigured deployment never accepts traffic.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    api,
    auth::{AuthError, AuthService, SEEDED_ROLES},
    config::{AppConfig, LogFormat},
    providers::{InsightClient, InsightError},
    state::AppState,
    storage::{AuthDatabase, StorageError},
};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// How long in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to initialise logging: {0}")]
    Logging(String),

    #[error("failed to open database: {0}")]
    Storage(#[from] StorageError),

    #[error("auth setup failed: {0}")]
    Auth(#[from] AuthError),

    #[error("bootstrap admin `{0}` conflicts with an existing account")]
    BootstrapAdmin(String),

    #[error("insight client setup failed: {0}")]
    Insights(#[from] InsightError),

    #[error("failed to load TLS certificate or key: {0}")]
    Tls(std::io::Error),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Install the global tracing subscriber.
pub fn init_tracing(format: LogFormat) -> Result<(), StartupError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    }
    .map_err(|e| StartupError::Logging(e.to_string()))
}

/// Open storage, seed the role catalog and build the shared state.
///
/// Synchronous: runs redb and Argon2 work before the listener exists.
pub fn bootstrap(config: &AppConfig) -> Result<AppState, StartupError> {
    let db_path = config.database_path();
    let db = Arc::new(AuthDatabase::open(&db_path)?);
    info!(path = %db_path.display(), "database opened");

    let auth = AuthService::new(
        db.clone(),
        config.signing_key.clone(),
        config.token_lifetimes,
    )?;

    let created = auth.roles().ensure_seeded(SEEDED_ROLES)?;
    info!(
        created = created.len(),
        total = SEEDED_ROLES.len(),
        "role catalog ready"
    );

    if let Some(admin) = &config.bootstrap_admin {
        let identity = auth
            .bootstrap_admin(&admin.username, &admin.email, &admin.password)
            .map_err(|e| match e {
                AuthError::DuplicateIdentity => StartupError::BootstrapAdmin(admin.username.clone()),
                other => other.into(),
            })?;
        info!(subject = %identity.username, user_id = %identity.id, "bootstrap admin ready");
    }

    let mut state =
        AppState::new(db, Arc::new(auth))
            .with_max_upload_bytes(config.max_upload_bytes)
            .with_cors_allowed_origins(config.cors_allowed_origins.clone());

    match &config.gemini {
        Some(gemini) => {
            let client = InsightClient::new(&gemini.api_url, &gemini.model, gemini.api_key.clone())?;
            info!(endpoint = %client.endpoint(), "insight service configured");
            state = state.with_insights(client);
        }
        None => warn!("GEMINI_API_KEY not set, insight uploads will return 503"),
    }

    Ok(state)
}

/// Bind the listener and serve until SIGINT or SIGTERM.
pub async fn serve(config: &AppConfig, state: AppState) -> Result<(), StartupError> {
    let addr = config.bind_addr();
    let app = api::router(state);

    let handle: Handle<SocketAddr> = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    match &config.tls {
        Some(tls) => {
            if rustls::crypto::ring::default_provider()
                .install_default()
                .is_err()
            {
                warn!("rustls crypto provider was already installed");
            }
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .map_err(StartupError::Tls)?;

            info!(%addr, "listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!(%addr, "listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    info!("server stopped");
    Ok(())
}

/// Load state and serve. Used by the binary after logging is up.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    info!(config = ?config, "starting meeting insights server");
    let state = bootstrap(&config)?;
    serve(&config, state).await
}

async fn shutdown_signal(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("received Ctrl+C, shutting down"),
        _ = terminate => warn!("received SIGTERM, shutting down"),
    }

    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
