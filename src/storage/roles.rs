// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role catalog persistence.

use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::database::{AuthDatabase, StorageResult, ROLES};

/// A named role. Names are unique and treated as opaque, case-sensitive strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Role {
    id: String,
    name: String,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Repository for the `roles` table.
pub struct RoleRepository<'a> {
    db: &'a AuthDatabase,
}

impl<'a> RoleRepository<'a> {
    pub fn new(db: &'a AuthDatabase) -> Self {
        Self { db }
    }

    /// Insert a role unless one with the same name exists.
    ///
    /// Returns the stored role and whether this call created it.
    pub fn insert_if_absent(&self, name: &str) -> StorageResult<(Role, bool)> {
        self.db.write(|txn| {
            let mut table = txn.open_table(ROLES)?;
            let existing = match table.get(name)? {
                Some(guard) => Some(serde_json::from_slice::<Role>(guard.value())?),
                None => None,
            };
            if let Some(role) = existing {
                return Ok((role, false));
            }

            let role = Role::new(name);
            let bytes = serde_json::to_vec(&role)?;
            table.insert(name, bytes.as_slice())?;
            Ok((role, true))
        })
    }

    pub fn find_by_name(&self, name: &str) -> StorageResult<Option<Role>> {
        let read_txn = self.db.database().begin_read()?;
        let table = read_txn.open_table(ROLES)?;
        match table.get(name)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// All roles ordered by name.
    pub fn list(&self) -> StorageResult<Vec<Role>> {
        let read_txn = self.db.database().begin_read()?;
        let table = read_txn.open_table(ROLES)?;
        let mut roles = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            roles.push(serde_json::from_slice(value.value())?);
        }
        Ok(roles)
    }
}
