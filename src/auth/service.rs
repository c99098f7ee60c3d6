// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Register, login and refresh flows.
//!
//! Every method here is synchronous and may run Argon2 or touch redb, so HTTP
//! handlers call them through `spawn_blocking`.

use std::sync::Arc;

use tracing::{info, warn};

use super::claims::TokenType;
use super::credentials::{CredentialStore, Registration};
use super::password::verify_password;
use super::roles::{RoleRegistry, ROLE_ADMIN};
use super::token::{SigningKey, TokenIssuer, TokenLifetimes, TokenValidator};
use super::AuthError;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest};
use crate::storage::{normalize_key, AuthDatabase, StoredIdentity};

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Orchestrates the credential store, role registry and token issuer.
pub struct AuthService {
    credentials: CredentialStore,
    roles: RoleRegistry,
    issuer: TokenIssuer,
    validator: TokenValidator,
}

impl AuthService {
    pub fn new(
        db: Arc<AuthDatabase>,
        key: SigningKey,
        lifetimes: TokenLifetimes,
    ) -> Result<Self, AuthError> {
        let roles = RoleRegistry::new(db.clone());
        Ok(Self {
            credentials: CredentialStore::new(db, roles.clone())?,
            roles,
            issuer: TokenIssuer::new(key.clone(), lifetimes),
            validator: TokenValidator::new(key),
        })
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    pub fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        validate_registration(request)?;
        let registration =
            Registration::new(&request.username, &request.email, &request.password).with_names(
                request.first_name.as_deref(),
                request.last_name.as_deref(),
            );
        let identity = self.credentials.register(registration)?;
        self.respond(&identity, "User registered successfully")
    }

    pub fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError> {
        if request.identifier.trim().is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation(
                "identifier and password are required".to_string(),
            ));
        }
        let identity = self
            .credentials
            .verify(&request.identifier, &request.password)?;
        info!(user_id = %identity.id, "login succeeded");
        self.respond(&identity, "Login successful")
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// Roles are re-read from storage, so grants made since the last login
    /// show up in the new access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, AuthError> {
        let claims = self
            .validator
            .validate_as(refresh_token.trim(), TokenType::Refresh)?;
        let identity = self
            .credentials
            .find_by_subject(&claims.sub)?
            .ok_or(AuthError::Unauthenticated)?;
        self.respond(&identity, "Token refreshed")
    }

    /// Create the configured admin account, or grant the admin role to it if
    /// it already exists.
    ///
    /// An existing account only qualifies when its email and password both
    /// match the configured ones; anything else is `DuplicateIdentity`, so a
    /// self-registered account holding the admin username never gains the role.
    pub fn bootstrap_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<StoredIdentity, AuthError> {
        let identity = match self.credentials.find_by_subject(username)? {
            Some(existing) => {
                let same_email = normalize_key(&existing.email) == normalize_key(email);
                if !same_email || !verify_password(password, &existing.password_hash)? {
                    warn!(
                        subject = %existing.username,
                        "bootstrap admin username is held by an account with different credentials"
                    );
                    return Err(AuthError::DuplicateIdentity);
                }
                existing
            }
            None => self
                .credentials
                .register(Registration::new(username, email, password))?,
        };
        if identity.has_role(ROLE_ADMIN) {
            return Ok(identity);
        }
        self.credentials.grant_role(&identity.id, ROLE_ADMIN)
    }

    fn respond(&self, identity: &StoredIdentity, message: &str) -> Result<AuthResponse, AuthError> {
        let mut roles = identity.role_names();
        roles.sort();
        let tokens = self.issuer.issue_pair(&identity.username, &roles)?;
        Ok(AuthResponse {
            token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: tokens.expires_in,
            subject: identity.username.clone(),
            user_id: identity.id.clone(),
            email: identity.email.clone(),
            roles,
            message: message.to_string(),
        })
    }
}

fn validate_registration(request: &RegisterRequest) -> Result<(), AuthError> {
    if request.username.trim().is_empty() {
        return Err(AuthError::Validation("username is required".to_string()));
    }
    if request.username.trim().contains('@') {
        return Err(AuthError::Validation(
            "username must not contain '@'".to_string(),
        ));
    }
    let email = request.email.trim();
    if email.is_empty() {
        return Err(AuthError::Validation("email is required".to_string()));
    }
    if !email.contains('@') {
        return Err(AuthError::Validation("email is not valid".to_string()));
    }
    if request.password.is_empty() {
        return Err(AuthError::Validation("password is required".to_string()));
    }
    Ok(())
}
