// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity persistence with unique username and email indexes.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::database::{
    AuthDatabase, StorageError, StorageResult, UniqueField, EMAIL_INDEX, USERNAME_INDEX, USERS,
};
use super::roles::Role;

/// Canonical form used for uniqueness and lookups: NFKC, trimmed, lower-cased.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().nfkc().collect::<String>().to_lowercase()
}

/// A registered identity as stored in the database.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl StoredIdentity {
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name().to_string()).collect()
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name() == name)
    }
}

impl std::fmt::Debug for StoredIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredIdentity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("roles", &self.role_names())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Repository for identities.
pub struct UserRepository<'a> {
    db: &'a AuthDatabase,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a AuthDatabase) -> Self {
        Self { db }
    }

    /// Insert a new identity.
    ///
    /// The index checks and the writes share one write transaction, so two
    /// concurrent inserts with the same username or email cannot both succeed.
    pub fn insert(&self, identity: &StoredIdentity) -> StorageResult<()> {
        let username_key = normalize_key(&identity.username);
        let email_key = normalize_key(&identity.email);

        self.db.write(|txn| {
            let mut usernames = txn.open_table(USERNAME_INDEX)?;
            if usernames.get(username_key.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(UniqueField::Username));
            }
            let mut emails = txn.open_table(EMAIL_INDEX)?;
            if emails.get(email_key.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(UniqueField::Email));
            }

            let bytes = serde_json::to_vec(identity)?;
            let mut users = txn.open_table(USERS)?;
            users.insert(identity.id.as_str(), bytes.as_slice())?;
            usernames.insert(username_key.as_str(), identity.id.as_str())?;
            emails.insert(email_key.as_str(), identity.id.as_str())?;
            Ok(())
        })?;

        tracing::debug!(user_id = %identity.id, "identity stored");
        Ok(())
    }

    pub fn get(&self, id: &str) -> StorageResult<Option<StoredIdentity>> {
        let read_txn = self.db.database().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn find_by_username(&self, username: &str) -> StorageResult<Option<StoredIdentity>> {
        self.find_via_index(USERNAME_INDEX, &normalize_key(username))
    }

    pub fn find_by_email(&self, email: &str) -> StorageResult<Option<StoredIdentity>> {
        self.find_via_index(EMAIL_INDEX, &normalize_key(email))
    }

    /// Look up by username first, then by email.
    pub fn find_by_identifier(&self, identifier: &str) -> StorageResult<Option<StoredIdentity>> {
        match self.find_by_username(identifier)? {
            Some(identity) => Ok(Some(identity)),
            None => self.find_by_email(identifier),
        }
    }

    fn find_via_index(
        &self,
        index: TableDefinition<'static, &'static str, &'static str>,
        key: &str,
    ) -> StorageResult<Option<StoredIdentity>> {
        let read_txn = self.db.database().begin_read()?;
        let index = read_txn.open_table(index)?;
        let Some(id) = index.get(key)?.map(|guard| guard.value().to_string()) else {
            return Ok(None);
        };

        let users = read_txn.open_table(USERS)?;
        match users.get(id.as_str())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Err(StorageError::NotFound(format!(
                "index points at missing user {id}"
            ))),
        }
    }

    /// Attach a role to an identity. Already-held roles are left as they are.
    pub fn add_role(&self, id: &str, role: &Role) -> StorageResult<StoredIdentity> {
        self.db.write(|txn| {
            let mut table = txn.open_table(USERS)?;
            let mut identity: StoredIdentity = match table.get(id)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(StorageError::NotFound(format!("user {id}"))),
            };
            if !identity.has_role(role.name()) {
                identity.roles.push(role.clone());
                let bytes = serde_json::to_vec(&identity)?;
                table.insert(id, bytes.as_slice())?;
            }
            Ok(identity)
        })
    }

    pub fn list(&self) -> StorageResult<Vec<StoredIdentity>> {
        let read_txn = self.db.database().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        let mut identities: Vec<StoredIdentity> = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            identities.push(serde_json::from_slice(value.value())?);
        }
        identities.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(identities)
    }

    pub fn count(&self) -> StorageResult<u64> {
        let read_txn = self.db.database().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        Ok(table.len()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn open_db() -> (AuthDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = AuthDatabase::open(&dir.path().join("auth.redb")).unwrap();
        (db, dir)
    }

    fn identity(username: &str, email: &str) -> StoredIdentity {
        StoredIdentity {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            first_name: None,
            last_name: None,
            roles: vec![Role::new("ROLE_USER")],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_and_find_by_either_identifier() {
        let (db, _dir) = open_db();
        let repo = UserRepository::new(&db);
        let alice = identity("alice", "alice@x.com");
        repo.insert(&alice).unwrap();

        assert_eq!(repo.find_by_identifier("alice").unwrap().unwrap().id, alice.id);
        assert_eq!(
            repo.find_by_identifier("alice@x.com").unwrap().unwrap().id,
            alice.id
        );
        assert_eq!(repo.get(&alice.id).unwrap().unwrap().email, "alice@x.com");
        assert!(repo.find_by_identifier("bob").unwrap().is_none());
    }

    #[test]
    fn duplicates_are_rejected_after_normalization() {
        let (db, _dir) = open_db();
        let repo = UserRepository::new(&db);
        repo.insert(&identity("alice", "alice@x.com")).unwrap();

        let err = repo.insert(&identity("ALICE", "other@x.com")).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(UniqueField::Username)));

        let err = repo.insert(&identity("bob", " Alice@X.com ")).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(UniqueField::Email)));

        assert_eq!(repo.count().unwrap(), 1);
        // The rejected username must not have leaked into the index.
        assert!(repo.find_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn fullwidth_characters_collide_with_ascii() {
        let (db, _dir) = open_db();
        let repo = UserRepository::new(&db);
        repo.insert(&identity("alice", "alice@x.com")).unwrap();

        // U+FF41 FULLWIDTH LATIN SMALL LETTER A folds to 'a' under NFKC.
        let err = repo
            .insert(&identity("\u{ff41}lice", "a2@x.com"))
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(UniqueField::Username)));
    }

    #[test]
    fn add_role_is_idempotent() {
        let (db, _dir) = open_db();
        let repo = UserRepository::new(&db);
        let alice = identity("alice", "alice@x.com");
        repo.insert(&alice).unwrap();

        let admin = Role::new("ROLE_ADMIN");
        repo.add_role(&alice.id, &admin).unwrap();
        let updated = repo.add_role(&alice.id, &admin).unwrap();
        assert_eq!(updated.role_names(), vec!["ROLE_USER", "ROLE_ADMIN"]);

        let err = repo.add_role("missing", &admin).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn concurrent_duplicate_inserts_yield_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(AuthDatabase::open(&dir.path().join("auth.redb")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let db = db.clone();
                std::thread::spawn(move || {
                    UserRepository::new(&db).insert(&identity(&format!("user{i}"), "same@x.com"))
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(UserRepository::new(&db).count().unwrap(), 1);
    }

    #[test]
    fn debug_output_redacts_password_hash() {
        let alice = identity("alice", "alice@x.com");
        let rendered = format!("{alice:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("argon2id"));
    }
}
