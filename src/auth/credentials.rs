// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential store: registration and password verification.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::password::{hash_password, verify_password};
use super::roles::{RoleRegistry, DEFAULT_ROLE, SEEDED_ROLES};
use super::AuthError;
use crate::storage::{AuthDatabase, StorageError, StoredIdentity, UserRepository};

/// Input for a new registration. Borrowed so raw passwords are never copied.
#[derive(Clone, Copy)]
pub struct Registration<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
}

impl<'a> Registration<'a> {
    pub fn new(username: &'a str, email: &'a str, password: &'a str) -> Self {
        Self {
            username,
            email,
            password,
            first_name: None,
            last_name: None,
        }
    }

    pub fn with_names(mut self, first_name: Option<&'a str>, last_name: Option<&'a str>) -> Self {
        self.first_name = first_name;
        self.last_name = last_name;
        self
    }
}

impl std::fmt::Debug for Registration<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Durable identities with unique usernames and emails.
#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<AuthDatabase>,
    roles: RoleRegistry,
    /// Hash compared against when the identifier is unknown, so that path
    /// costs one Argon2 verification like the known-identifier path.
    dummy_hash: Arc<str>,
}

impl CredentialStore {
    pub fn new(db: Arc<AuthDatabase>, roles: RoleRegistry) -> Result<Self, AuthError> {
        let dummy_hash = hash_password(&Uuid::new_v4().to_string())?;
        Ok(Self {
            db,
            roles,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// Register a new identity holding the default role.
    pub fn register(&self, registration: Registration<'_>) -> Result<StoredIdentity, AuthError> {
        let default_role = self.roles.find_by_name(DEFAULT_ROLE)?;
        let identity = StoredIdentity {
            id: Uuid::new_v4().to_string(),
            username: registration.username.trim().to_string(),
            email: registration.email.trim().to_string(),
            password_hash: hash_password(registration.password)?,
            first_name: non_blank(registration.first_name),
            last_name: non_blank(registration.last_name),
            roles: vec![default_role],
            created_at: Utc::now(),
        };

        match UserRepository::new(&self.db).insert(&identity) {
            Ok(()) => {
                info!(user_id = %identity.id, username = %identity.username, "identity registered");
                Ok(identity)
            }
            Err(StorageError::AlreadyExists(field)) => {
                info!(%field, "registration rejected: identifier taken");
                Err(AuthError::DuplicateIdentity)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check a username-or-email and password pair.
    ///
    /// Unknown identifiers and wrong passwords both yield `InvalidCredentials`.
    pub fn verify(&self, identifier: &str, password: &str) -> Result<StoredIdentity, AuthError> {
        let found = UserRepository::new(&self.db).find_by_identifier(identifier)?;
        let hash = match &found {
            Some(identity) => identity.password_hash.as_str(),
            None => self.dummy_hash.as_ref(),
        };
        let matches = verify_password(password, hash)?;

        match found {
            Some(identity) if matches => Ok(identity),
            _ => {
                warn!("login rejected: invalid credentials");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Look up an identity by token subject (username).
    pub fn find_by_subject(&self, subject: &str) -> Result<Option<StoredIdentity>, AuthError> {
        Ok(UserRepository::new(&self.db).find_by_username(subject)?)
    }

    /// Attach an already-seeded role to an identity. Idempotent.
    ///
    /// Names outside [`SEEDED_ROLES`] are a `Validation` error; a seeded name
    /// missing from storage is still `RoleNotFound`.
    pub fn grant_role(&self, user_id: &str, role_name: &str) -> Result<StoredIdentity, AuthError> {
        if !SEEDED_ROLES.contains(&role_name) {
            return Err(AuthError::Validation(format!("unknown role: {role_name}")));
        }
        let role = self.roles.find_by_name(role_name)?;
        match UserRepository::new(&self.db).add_role(user_id, &role) {
            Ok(identity) => {
                info!(user_id, role = role.name(), "role granted");
                Ok(identity)
            }
            Err(StorageError::NotFound(_)) => Err(AuthError::NotFound(format!("user {user_id}"))),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list(&self) -> Result<Vec<StoredIdentity>, AuthError> {
        Ok(UserRepository::new(&self.db).list()?)
    }

    pub fn count(&self) -> Result<u64, AuthError> {
        Ok(UserRepository::new(&self.db).count()?)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::{ROLE_ADMIN, SEEDED_ROLES};

    fn store() -> (CredentialStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(AuthDatabase::open(&dir.path().join("auth.redb")).unwrap());
        let roles = RoleRegistry::new(db.clone());
        roles.ensure_seeded(SEEDED_ROLES).unwrap();
        (CredentialStore::new(db, roles).unwrap(), dir)
    }

    #[test]
    fn register_assigns_default_role_and_hashes_password() {
        let (store, _dir) = store();
        let alice = store
            .register(Registration::new("alice", "alice@x.com", "pw123"))
            .unwrap();

        assert_eq!(alice.role_names(), vec!["ROLE_USER"]);
        assert_ne!(alice.password_hash, "pw123");
        assert!(alice.password_hash.starts_with("$argon2id$"));
    }

    #[test]
    fn same_email_twice_is_duplicate_with_one_record() {
        let (store, _dir) = store();
        store
            .register(Registration::new("alice", "alice@x.com", "pw123"))
            .unwrap();
        let err = store
            .register(Registration::new("alice2", "alice@x.com", "other"))
            .unwrap_err();

        assert!(matches!(err, AuthError::DuplicateIdentity));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn verify_accepts_username_or_email() {
        let (store, _dir) = store();
        let alice = store
            .register(Registration::new("alice", "alice@x.com", "pw123"))
            .unwrap();

        assert_eq!(store.verify("alice", "pw123").unwrap().id, alice.id);
        assert_eq!(store.verify("Alice@X.com", "pw123").unwrap().id, alice.id);
    }

    #[test]
    fn wrong_password_and_unknown_user_are_indistinguishable() {
        let (store, _dir) = store();
        store
            .register(Registration::new("alice", "alice@x.com", "pw123"))
            .unwrap();

        let wrong = store.verify("alice", "nope").unwrap_err();
        let unknown = store.verify("mallory", "pw123").unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[test]
    fn register_fails_fast_when_default_role_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(AuthDatabase::open(&dir.path().join("auth.redb")).unwrap());
        let store = CredentialStore::new(db.clone(), RoleRegistry::new(db)).unwrap();

        let err = store
            .register(Registration::new("alice", "alice@x.com", "pw123"))
            .unwrap_err();
        assert!(matches!(err, AuthError::RoleNotFound(_)));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn grant_role_is_idempotent_and_checks_inputs() {
        let (store, _dir) = store();
        let alice = store
            .register(Registration::new("alice", "alice@x.com", "pw123"))
            .unwrap();

        store.grant_role(&alice.id, ROLE_ADMIN).unwrap();
        let updated = store.grant_role(&alice.id, ROLE_ADMIN).unwrap();
        assert_eq!(updated.role_names(), vec!["ROLE_USER", "ROLE_ADMIN"]);

        assert!(matches!(
            store.grant_role(&alice.id, "ROLE_ROOT"),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            store.grant_role("missing", ROLE_ADMIN),
            Err(AuthError::NotFound(_))
        ));
    }

    #[test]
    fn seeded_role_missing_from_storage_is_role_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(AuthDatabase::open(&dir.path().join("auth.redb")).unwrap());
        let roles = RoleRegistry::new(db.clone());
        roles.ensure_seeded(&[DEFAULT_ROLE]).unwrap();
        let store = CredentialStore::new(db, roles).unwrap();
        let alice = store
            .register(Registration::new("alice", "alice@x.com", "pw123"))
            .unwrap();

        assert!(matches!(
            store.grant_role(&alice.id, ROLE_ADMIN),
            Err(AuthError::RoleNotFound(_))
        ));
    }

    #[test]
    fn profile_names_are_trimmed_and_optional() {
        let (store, _dir) = store();
        let bob = store
            .register(
                Registration::new(" bob ", "bob@x.com", "pw").with_names(Some(" Bob "), Some("  ")),
            )
            .unwrap();
        assert_eq!(bob.username, "bob");
        assert_eq!(bob.first_name.as_deref(), Some("Bob"));
        assert_eq!(bob.last_name, None);
        assert!(store.find_by_subject("BOB").unwrap().is_some());
    }
}
