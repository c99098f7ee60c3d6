// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests.

use std::sync::Arc;

use tempfile::TempDir;

use crate::auth::{AuthService, SigningKey, TokenLifetimes, SEEDED_ROLES};
use crate::state::AppState;
use crate::storage::{AuthDatabase, DATABASE_FILE};

pub const TEST_SECRET: &str = "test-signing-secret-that-is-at-least-32-bytes";

pub fn signing_key() -> SigningKey {
    SigningKey::new(TEST_SECRET).unwrap()
}

/// Open a fresh database in a temp dir. Keep the `TempDir` alive for the
/// duration of the test.
pub fn database() -> (Arc<AuthDatabase>, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = AuthDatabase::open(&dir.path().join(DATABASE_FILE)).unwrap();
    (Arc::new(db), dir)
}

fn seeded_service(db: Arc<AuthDatabase>) -> AuthService {
    let service = AuthService::new(db, signing_key(), TokenLifetimes::default()).unwrap();
    service.roles().ensure_seeded(SEEDED_ROLES).unwrap();
    service
}

/// An [`AuthService`] over a seeded database.
pub fn auth_service() -> (AuthService, TempDir) {
    let (db, dir) = database();
    (seeded_service(db), dir)
}

/// Application state without an insight client.
pub fn app_state() -> (AppState, TempDir) {
    let (db, dir) = database();
    let service = seeded_service(db.clone());
    (AppState::new(db, Arc::new(service)), dir)
}
