// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role catalog.
//!
//! ## Seeded Roles
//!
//! - `ROLE_USER` - Assigned to every new registration
//! - `ROLE_ADMIN` - Administrative routes and role grants
//! - `ROLE_MODERATOR` - Moderator routes
//!
//! The set is seeded once at startup and is read-only afterwards. A role
//! required at request time that is missing from the catalog is a
//! configuration fault, never something to create on the fly.

use std::sync::Arc;

use tracing::{error, info};

use super::AuthError;
use crate::storage::{AuthDatabase, RoleRepository};

pub use crate::storage::Role;

pub const ROLE_USER: &str = "ROLE_USER";
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
pub const ROLE_MODERATOR: &str = "ROLE_MODERATOR";

/// Role attached to every new identity.
pub const DEFAULT_ROLE: &str = ROLE_USER;

/// Roles created at startup.
pub const SEEDED_ROLES: &[&str] = &[ROLE_USER, ROLE_ADMIN, ROLE_MODERATOR];

#[derive(Clone)]
pub struct RoleRegistry {
    db: Arc<AuthDatabase>,
}

impl RoleRegistry {
    pub fn new(db: Arc<AuthDatabase>) -> Self {
        Self { db }
    }

    /// Create every listed role that does not exist yet.
    ///
    /// Returns the roles created by this call; an empty result means the
    /// catalog was already complete.
    pub fn ensure_seeded(&self, names: &[&str]) -> Result<Vec<Role>, AuthError> {
        let repo = RoleRepository::new(&self.db);
        let mut created = Vec::new();
        for name in names {
            let (role, inserted) = repo.insert_if_absent(name)?;
            if inserted {
                info!(role = role.name(), "seeded role");
                created.push(role);
            }
        }
        Ok(created)
    }

    pub fn find_by_name(&self, name: &str) -> Result<Role, AuthError> {
        match RoleRepository::new(&self.db).find_by_name(name)? {
            Some(role) => Ok(role),
            None => {
                error!(role = name, "role missing from catalog; was seeding skipped?");
                Err(AuthError::RoleNotFound(name.to_string()))
            }
        }
    }

    pub fn list(&self) -> Result<Vec<Role>, AuthError> {
        Ok(RoleRepository::new(&self.db).list()?)
    }
}
