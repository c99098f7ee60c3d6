// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role-gated demonstration endpoints.
//!
//! Each handler only builds a message; access control happens in the route
//! policies installed by the router.

use axum::Json;

use crate::auth::{Auth, OptionalAuth};
use crate::models::MessageResponse;

/// Open to everyone.
#[utoipa::path(
    get,
    path = "/api/secure/public",
    tag = "Secure",
    responses((status = 200, description = "Public content", body = MessageResponse))
)]
pub async fn public_access(OptionalAuth(user): OptionalAuth) -> Json<MessageResponse> {
    let message = match user {
        Some(user) => format!("Public content. Signed in as {}.", user.subject),
        None => "Public content.".to_string(),
    };
    Json(MessageResponse::new(message))
}

#[utoipa::path(
    get,
    path = "/api/secure/user",
    tag = "Secure",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User content", body = MessageResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "ROLE_USER or ROLE_ADMIN required")
    )
)]
pub async fn user_access(Auth(user): Auth) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "User content for {}.",
        user.subject
    )))
}

#[utoipa::path(
    get,
    path = "/api/secure/admin",
    tag = "Secure",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Admin content", body = MessageResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "ROLE_ADMIN required")
    )
)]
pub async fn admin_access(Auth(user): Auth) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "Admin board for {}.",
        user.subject
    )))
}

#[utoipa::path(
    get,
    path = "/api/secure/moderator",
    tag = "Secure",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Moderator content", body = MessageResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "ROLE_MODERATOR required")
    )
)]
pub async fn moderator_access(Auth(user): Auth) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "Moderator board for {}.",
        user.subject
    )))
}

/// Any of the seeded roles.
#[utoipa::path(
    get,
    path = "/api/secure/all",
    tag = "Secure",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Content for any role", body = MessageResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "No seeded role held")
    )
)]
pub async fn all_access(Auth(user): Auth) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "Hello {}, your roles: {}.",
        user.subject,
        user.roles.join(", ")
    )))
}

/// Any authenticated caller.
#[utoipa::path(
    get,
    path = "/api/test/hello",
    tag = "Secure",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Greeting", body = MessageResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn hello(Auth(user): Auth) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!("Hello, {}!", user.subject)))
}

#[utoipa::path(
    get,
    path = "/user/profile",
    tag = "Secure",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Profile greeting", body = MessageResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "ROLE_USER or ROLE_ADMIN required")
    )
)]
pub async fn user_profile(Auth(user): Auth) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "Profile of {}.",
        user.subject
    )))
}
