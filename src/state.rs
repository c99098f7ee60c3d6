// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderValue;

use crate::auth::{AuthService, TokenValidator};
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::providers::InsightClient;
use crate::storage::AuthDatabase;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<AuthDatabase>,
    pub auth: Arc<AuthService>,
    /// `None` when no insight service key is configured
    pub insights: Option<Arc<InsightClient>>,
    pub max_upload_bytes: usize,
    /// Browser origins allowed by CORS; empty allows any origin
    pub cors_allowed_origins: Vec<HeaderValue>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: Arc<AuthDatabase>, auth: Arc<AuthService>) -> Self {
        Self {
            db,
            auth,
            insights: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_allowed_origins: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn with_insights(mut self, client: InsightClient) -> Self {
        self.insights = Some(Arc::new(client));
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn with_cors_allowed_origins(mut self, origins: Vec<HeaderValue>) -> Self {
        self.cors_allowed_origins = origins;
        self
    }

    pub fn validator(&self) -> TokenValidator {
        self.auth.validator().clone()
    }
}
