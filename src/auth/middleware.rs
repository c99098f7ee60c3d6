// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication gate for Axum.
//!
//! Applied to the whole router. It never rejects a request: a valid access
//! token puts an [`AuthenticatedUser`] into the request extensions, anything
//! else leaves the request anonymous and route policies decide what that
//! means.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .merge(routes)
//!     .layer(from_fn_with_state(validator, authenticate));
//! ```

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::claims::TokenType;
use super::token::TokenValidator;
use super::AuthenticatedUser;

/// Authentication middleware function.
pub async fn authenticate(
    State(validator): State<TokenValidator>,
    mut request: Request,
    next: Next,
) -> Response {
    // Identity is only ever set here; drop anything already present.
    request.extensions_mut().remove::<AuthenticatedUser>();
    if let Some(user) = identify(request.headers(), &validator) {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}

/// Resolve the bearer credential in `headers`, if any, to an identity.
pub fn identify(headers: &HeaderMap, validator: &TokenValidator) -> Option<AuthenticatedUser> {
    let header = headers.get(AUTHORIZATION)?;
    let Some(token) = header.to_str().ok().and_then(bearer_token) else {
        debug!("authorization header is not a bearer credential; continuing anonymously");
        return None;
    };

    match validator.validate_as(token, TokenType::Access) {
        Ok(claims) => Some(AuthenticatedUser::from_claims(claims)),
        Err(e) => {
            debug!(reason = %e, "bearer token rejected; continuing anonymously");
            None
        }
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
