// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Durable state for identities and roles, kept in a single redb file under
//! `DATA_DIR`.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   auth.redb
//!     users            user_id -> identity JSON
//!     username_index   normalized username -> user_id
//!     email_index      normalized email -> user_id
//!     roles            role name -> role JSON
//! ```
//!
//! ## Important Notes
//!
//! - redb calls are synchronous; async callers go through `spawn_blocking`
//! - Password hashes are stored, plaintext passwords never are

pub mod database;
pub mod roles;
pub mod users;

pub use database::{AuthDatabase, StorageError, StorageResult, UniqueField};
pub use roles::{Role, RoleRepository};
pub use users::{normalize_key, StoredIdentity, UserRepository};

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "auth.redb";
