// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Stateless bearer-token authentication and role-based authorization.
//!
//! ## Auth Flow
//!
//! 1. Client registers (`POST /auth/register`) or logs in (`POST /auth/login`)
//! 2. Server verifies the password (Argon2id) and returns an HS256 access
//!    token plus a refresh token
//! 3. Client sends `Authorization: Bearer <access token>`
//! 4. The authentication gate validates the token once per request and puts
//!    an [`AuthenticatedUser`] into the request extensions
//! 5. A [`RolePolicy`] on the route group allows or denies the request
//!
//! ## Security
//!
//! - The signing key is loaded once at startup and never changes
//! - Signatures are checked before any token content is decoded
//! - Unknown users and wrong passwords are indistinguishable to clients
//! - No token state is kept server-side

pub mod claims;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod roles;
pub mod service;
pub mod token;

pub use claims::{AuthenticatedUser, Claims, TokenType};
pub use credentials::{CredentialStore, Registration};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, OptionalAuth};
pub use middleware::authenticate;
pub use policy::{authorize, RolePolicy};
pub use roles::{Role, RoleRegistry, DEFAULT_ROLE, ROLE_ADMIN, ROLE_MODERATOR, ROLE_USER, SEEDED_ROLES};
pub use service::AuthService;
pub use token::{SigningKey, TokenError, TokenIssuer, TokenLifetimes, TokenPair, TokenValidator};
