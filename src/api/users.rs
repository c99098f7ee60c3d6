// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, AuthenticatedUser};

/// Response for GET /users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Token subject (username)
    pub subject: String,
    /// Roles carried by the token
    pub roles: Vec<String>,
    /// Token expiration (Unix timestamp)
    pub expires_at: i64,
}

impl From<AuthenticatedUser> for UserMeResponse {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            subject: user.subject,
            roles: user.roles,
            expires_at: user.expires_at,
        }
    }
}

/// Get the current authenticated user's information.
///
/// This endpoint returns the identity and roles carried by the caller's token.
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(Auth(user): Auth) -> Json<UserMeResponse> {
    Json(user.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_me_response_from_authenticated_user() {
        let user = AuthenticatedUser {
            subject: "alice".to_string(),
            roles: vec!["ROLE_USER".to_string()],
            expires_at: 1_700_000_000,
        };

        let response: UserMeResponse = user.into();
        assert_eq!(response.subject, "alice");
        assert_eq!(response.roles, vec!["ROLE_USER"]);
        assert_eq!(response.expires_at, 1_700_000_000);
    }
}
