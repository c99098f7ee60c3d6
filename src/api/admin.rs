// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints sit behind the `ROLE_ADMIN` route policy and provide:
//! - A dashboard with user and role counts
//! - The role catalog
//! - User overview and role grants

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::blocking;
use crate::{
    auth::{AdminOnly, Auth, Role},
    error::ApiError,
    state::AppState,
    storage::StoredIdentity,
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Admin dashboard response.
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub message: String,
    /// Registered identities.
    pub total_users: u64,
    /// Roles in the catalog.
    pub total_roles: usize,
    /// Whether the insight service is configured.
    pub insights_enabled: bool,
    pub uptime_seconds: u64,
    pub timestamp: String,
}

/// Admin view of an identity. Never includes the password hash.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserSummary {
    pub user_id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<StoredIdentity> for AdminUserSummary {
    fn from(identity: StoredIdentity) -> Self {
        Self {
            roles: identity.role_names(),
            user_id: identity.id,
            username: identity.username,
            email: identity.email,
            first_name: identity.first_name,
            last_name: identity.last_name,
            created_at: identity.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserListResponse {
    pub users: Vec<AdminUserSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleListResponse {
    pub roles: Vec<Role>,
}

/// Body of `POST /admin/users/{user_id}/roles`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantRoleRequest {
    /// Name of an existing role, e.g. `ROLE_MODERATOR`
    pub role: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Admin dashboard with system counts.
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Dashboard", body = DashboardResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn dashboard(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let auth = state.auth.clone();
    let (total_users, total_roles) = blocking(move || {
        Ok((auth.credentials().count()?, auth.roles().list()?.len()))
    })
    .await?;

    Ok(Json(DashboardResponse {
        message: format!("Welcome to the admin dashboard, {}.", user.subject),
        total_users,
        total_roles,
        insights_enabled: state.insights.is_some(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// List the role catalog.
#[utoipa::path(
    get,
    path = "/admin/roles",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All roles", body = RoleListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_roles(State(state): State<AppState>) -> Result<Json<RoleListResponse>, ApiError> {
    let auth = state.auth.clone();
    let roles = blocking(move || auth.roles().list()).await?;
    Ok(Json(RoleListResponse { roles }))
}

/// List all registered users.
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All users", body = AdminUserListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<AdminUserListResponse>, ApiError> {
    let auth = state.auth.clone();
    let identities = blocking(move || auth.credentials().list()).await?;
    let users: Vec<AdminUserSummary> = identities.into_iter().map(Into::into).collect();
    Ok(Json(AdminUserListResponse {
        total: users.len(),
        users,
    }))
}

/// Grant an existing role to a user.
///
/// Takes effect on the user's next login or refresh.
#[utoipa::path(
    post,
    path = "/admin/users/{user_id}/roles",
    tag = "Admin",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User ID")),
    request_body = GrantRoleRequest,
    responses(
        (status = 200, description = "Updated user", body = AdminUserSummary),
        (status = 400, description = "Role name is not in the catalog"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Catalog role missing from storage")
    )
)]
pub async fn grant_role(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<GrantRoleRequest>,
) -> Result<Json<AdminUserSummary>, ApiError> {
    let auth = state.auth.clone();
    let role = request.role.trim().to_string();
    if role.is_empty() {
        return Err(ApiError::bad_request("role is required"));
    }

    let identity = blocking(move || auth.credentials().grant_role(&user_id, &role)).await?;
    tracing::info!(
        admin = %admin.subject,
        user_id = %identity.id,
        roles = ?identity.role_names(),
        "admin updated user roles"
    );
    Ok(Json(identity.into()))
}
