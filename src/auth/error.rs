// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::password::PasswordError;
use super::token::TokenError;
use crate::storage::StorageError;

/// Authentication error type.
///
/// Token failures never reach a client directly: the gate downgrades them to
/// "anonymous" and protected routes answer with `Unauthenticated`. The token
/// variants exist for `/auth/refresh` and for logging.
#[derive(Debug)]
pub enum AuthError {
    /// Username or email already registered
    DuplicateIdentity,
    /// Unknown identifier or wrong password (deliberately indistinguishable)
    InvalidCredentials,
    /// A role that should have been seeded is missing
    RoleNotFound(String),
    /// Token is not three non-empty segments, or its contents don't decode
    MalformedToken,
    /// Token signature does not match
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// Token is valid but of the wrong type for this use
    WrongTokenType,
    /// No valid identity on a protected route
    Unauthenticated,
    /// Identity lacks the required role
    Forbidden,
    /// Request body failed validation
    Validation(String),
    /// Referenced identity does not exist
    NotFound(String),
    /// Internal error
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::DuplicateIdentity => "duplicate_identity",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::RoleNotFound(_) => "role_not_found",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::WrongTokenType => "wrong_token_type",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Forbidden => "forbidden",
            AuthError::Validation(_) => "validation_error",
            AuthError::NotFound(_) => "not_found",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::WrongTokenType
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::DuplicateIdentity => StatusCode::CONFLICT,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::RoleNotFound(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to send to a client. Server faults get a generic text.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::RoleNotFound(_) => "Server role configuration is incomplete".to_string(),
            AuthError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::DuplicateIdentity => write!(f, "Username or email is already registered"),
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::RoleNotFound(name) => write!(f, "Role not found: {name}"),
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::WrongTokenType => write!(f, "Token type is not accepted here"),
            AuthError::Unauthenticated => write!(f, "Authentication is required"),
            AuthError::Forbidden => write!(f, "Insufficient permissions for this operation"),
            AuthError::Validation(msg) => write!(f, "{msg}"),
            AuthError::NotFound(what) => write!(f, "Not found: {what}"),
            AuthError::Internal(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => AuthError::MalformedToken,
            TokenError::SignatureInvalid => AuthError::InvalidSignature,
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::WrongType { .. } => AuthError::WrongTokenType,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(_) => AuthError::DuplicateIdentity,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, error_code = self.error_code(), "request failed");
        }
        let body = Json(AuthErrorBody {
            error: self.public_message(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
