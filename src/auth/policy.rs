// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route-level role policies.
//!
//! A policy is attached to a route group with `route_layer`, so it only runs
//! for matched routes and always before the handler:
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/admin/dashboard", get(dashboard))
//!     .route_layer(from_fn_with_state(RolePolicy::any_of([ROLE_ADMIN]), authorize));
//! ```

use std::collections::BTreeSet;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::{AuthError, AuthenticatedUser};

/// Role predicate for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolePolicy {
    /// No identity required
    Open,
    /// Identity must hold at least one of the roles (an empty set admits nobody)
    AnyOf(BTreeSet<String>),
    /// Identity must hold every role (an empty set admits any identity)
    AllOf(BTreeSet<String>),
}

impl RolePolicy {
    pub fn open() -> Self {
        RolePolicy::Open
    }

    /// Any authenticated identity, regardless of roles.
    pub fn authenticated() -> Self {
        RolePolicy::AllOf(BTreeSet::new())
    }

    pub fn any_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RolePolicy::AnyOf(roles.into_iter().map(Into::into).collect())
    }

    pub fn all_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RolePolicy::AllOf(roles.into_iter().map(Into::into).collect())
    }

    pub fn evaluate(&self, identity: Option<&AuthenticatedUser>) -> Result<(), AuthError> {
        let roles = match self {
            RolePolicy::Open => return Ok(()),
            RolePolicy::AnyOf(roles) | RolePolicy::AllOf(roles) => roles,
        };
        let Some(user) = identity else {
            return Err(AuthError::Unauthenticated);
        };

        let allowed = match self {
            RolePolicy::AnyOf(_) => user.has_any(roles.iter().map(String::as_str)),
            _ => user.has_all(roles.iter().map(String::as_str)),
        };
        if allowed {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// Middleware enforcing a [`RolePolicy`] against the identity set by the gate.
pub async fn authorize(
    State(policy): State<RolePolicy>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = request.extensions().get::<AuthenticatedUser>();
    if let Err(e) = policy.evaluate(identity) {
        tracing::info!(
            path = %request.uri().path(),
            subject = identity.map(|u| u.subject.as_str()),
            error_code = e.error_code(),
            "access denied"
        );
        return Err(e);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::{ROLE_ADMIN, ROLE_MODERATOR, ROLE_USER};

    fn user(roles: &[&str]) -> AuthenticatedUser {
        AuthenticatedUser {
            subject: "alice".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            expires_at: i64::MAX,
        }
    }

    #[test]
    fn open_admits_everyone() {
        assert!(RolePolicy::open().evaluate(None).is_ok());
        assert!(RolePolicy::open().evaluate(Some(&user(&[]))).is_ok());
    }

    #[test]
    fn anonymous_is_unauthenticated_on_protected_policies() {
        for policy in [
            RolePolicy::authenticated(),
            RolePolicy::any_of([ROLE_USER]),
            RolePolicy::all_of([ROLE_ADMIN]),
        ] {
            assert!(matches!(policy.evaluate(None), Err(AuthError::Unauthenticated)));
        }
    }

    #[test]
    fn authenticated_admits_identity_without_roles() {
        assert!(RolePolicy::authenticated().evaluate(Some(&user(&[]))).is_ok());
    }

    #[test]
    fn any_of_and_all_of() {
        let member = user(&[ROLE_USER]);
        let moderator_admin = user(&[ROLE_MODERATOR, ROLE_ADMIN]);

        let any = RolePolicy::any_of([ROLE_USER, ROLE_ADMIN]);
        assert!(any.evaluate(Some(&member)).is_ok());
        assert!(any.evaluate(Some(&moderator_admin)).is_ok());

        let admin_only = RolePolicy::any_of([ROLE_ADMIN]);
        assert!(matches!(
            admin_only.evaluate(Some(&member)),
            Err(AuthError::Forbidden)
        ));

        let both = RolePolicy::all_of([ROLE_MODERATOR, ROLE_ADMIN]);
        assert!(both.evaluate(Some(&moderator_admin)).is_ok());
        assert!(matches!(both.evaluate(Some(&member)), Err(AuthError::Forbidden)));
    }

    #[test]
    fn empty_any_of_admits_nobody() {
        let policy = RolePolicy::any_of(Vec::<String>::new());
        assert!(matches!(
            policy.evaluate(Some(&user(&[ROLE_ADMIN]))),
            Err(AuthError::Forbidden)
        ));
    }
}
