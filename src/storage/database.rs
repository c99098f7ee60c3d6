// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded identity database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredIdentity
//! - `username_index`: normalized username → user_id
//! - `email_index`: normalized email → user_id
//! - `roles`: role name → serialized Role
//!
//! redb serializes write transactions, so a lookup followed by an insert inside
//! one write transaction is atomic with respect to every other writer.

use std::path::Path;

use redb::{Database, TableDefinition, WriteTransaction};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: user_id → serialized StoredIdentity (JSON bytes).
pub(super) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique index: normalized username → user_id.
pub(super) const USERNAME_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("username_index");

/// Unique index: normalized email → user_id.
pub(super) const EMAIL_INDEX: TableDefinition<&str, &str> = TableDefinition::new("email_index");

/// Role catalog: role name → serialized Role (JSON bytes).
pub(super) const ROLES: TableDefinition<&str, &[u8]> = TableDefinition::new("roles");

// =============================================================================
// Error Type
// =============================================================================

/// Which unique column a rejected insert collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UniqueField::Username => write!(f, "username"),
            UniqueField::Email => write!(f, "email"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate {0}")]
    AlreadyExists(UniqueField),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// AuthDatabase
// =============================================================================

/// Embedded ACID store for identities and roles.
pub struct AuthDatabase {
    db: Database,
}

impl AuthDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERNAME_INDEX)?;
            let _ = write_txn.open_table(EMAIL_INDEX)?;
            let _ = write_txn.open_table(ROLES)?;
        }
        write_txn.commit()?;

        tracing::debug!(path = %path.display(), "identity database opened");
        Ok(Self { db })
    }

    pub(super) fn database(&self) -> &Database {
        &self.db
    }

    /// Run `body` inside a write transaction, committing on success and
    /// aborting on error so a rejected write leaves no partial state.
    pub(super) fn write<T>(
        &self,
        body: impl FnOnce(&WriteTransaction) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let write_txn = self.db.begin_write()?;
        match body(&write_txn) {
            Ok(value) => {
                write_txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                write_txn.abort()?;
                Err(e)
            }
        }
    }
}
