// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration, login and token refresh endpoints.

use axum::{extract::State, http::StatusCode, Json};

use super::blocking;
use crate::{
    error::ApiError,
    models::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest},
    state::AppState,
};

/// Register a new user.
///
/// The new account gets `ROLE_USER` and a token pair straight away.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 409, description = "Username or email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let auth = state.auth.clone();
    let response = blocking(move || auth.register(&request)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Log in with a username or email and a password.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing identifier or password"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let auth = state.auth.clone();
    let response = blocking(move || auth.login(&request)).await?;
    Ok(Json(response))
}

/// Exchange a refresh token for a new token pair.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens refreshed", body = AuthResponse),
        (status = 401, description = "Refresh token invalid, expired or of the wrong type")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let auth = state.auth.clone();
    let response = blocking(move || auth.refresh(&request.refresh_token)).await?;
    Ok(Json(response))
}
