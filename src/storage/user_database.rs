// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded user database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser (JSON bytes)
//! - `user_emails`: lowercase email → user_id
//!
//! The email index is maintained in the same write transaction as the user
//! record, so uniqueness checks and writes are atomic.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::auth::Role;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: user_id → serialized StoredUser (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique index: lowercase email → user_id.
const USER_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("user_emails");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UserDbError {
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

    #[error("creating database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("email already in use: {0}")]
    DuplicateEmail(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type UserDbResult<T> = Result<T, UserDbError>;

// =============================================================================
// Stored Record
// =============================================================================

/// User record as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    pub id: String,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
    pub roles: Vec<Role>,
    /// bcrypt hash of the password
    pub password_hash: String,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// Normalized key for the email index.
fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

// =============================================================================
// UserDatabase
// =============================================================================

/// Embedded ACID user database.
pub struct UserDatabase {
    db: Database,
}

impl UserDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> UserDbResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAILS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert a new user. Fails if the email is already taken.
    pub fn insert_user(&self, user: &StoredUser) -> UserDbResult<()> {
        let json = serde_json::to_vec(user)?;
        let key = email_key(&user.email);

        let write_txn = self.db.begin_write()?;
        {
            let mut emails = write_txn.open_table(USER_EMAILS)?;
            if emails.get(key.as_str())?.is_some() {
                return Err(UserDbError::DuplicateEmail(user.email.clone()));
            }
            emails.insert(key.as_str(), user.id.as_str())?;

            let mut users = write_txn.open_table(USERS)?;
            users.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Insert a user unless one with the same id already exists.
    ///
    /// Returns `true` if the user was inserted.
    pub fn insert_if_absent(&self, user: &StoredUser) -> UserDbResult<bool> {
        if self.get_user(&user.id)?.is_some() {
            return Ok(false);
        }
        self.insert_user(user)?;
        Ok(true)
    }

    /// Look up a user by id.
    pub fn get_user(&self, user_id: &str) -> UserDbResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up a user by email (case-insensitive).
    pub fn get_user_by_email(&self, email: &str) -> UserDbResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let emails = read_txn.open_table(USER_EMAILS)?;
        let Some(user_id) = emails.get(email_key(email).as_str())? else {
            return Ok(None);
        };

        let users = read_txn.open_table(USERS)?;
        match users.get(user_id.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// One page of users ordered by id.
    pub fn list_users(&self, offset: usize, limit: usize) -> UserDbResult<Vec<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        let mut users = Vec::with_capacity(limit.min(256));
        for entry in table.iter()?.skip(offset).take(limit) {
            let (_, value) = entry?;
            users.push(serde_json::from_slice(value.value())?);
        }
        Ok(users)
    }

    /// Replace an existing user record, keeping the email index in sync.
    pub fn update_user(&self, user: &StoredUser) -> UserDbResult<()> {
        let json = serde_json::to_vec(user)?;
        let new_key = email_key(&user.email);

        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            let previous: StoredUser = match users.get(user.id.as_str())? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(UserDbError::NotFound(user.id.clone())),
            };

            let old_key = email_key(&previous.email);
            if old_key != new_key {
                let mut emails = write_txn.open_table(USER_EMAILS)?;
                let owner = emails.get(new_key.as_str())?.map(|v| v.value().to_string());
                if owner.is_some_and(|owner| owner != user.id) {
                    return Err(UserDbError::DuplicateEmail(user.email.clone()));
                }
                emails.remove(old_key.as_str())?;
                emails.insert(new_key.as_str(), user.id.as_str())?;
            }

            users.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete a user. Returns whether a record was removed.
    pub fn delete_user(&self, user_id: &str) -> UserDbResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut users = write_txn.open_table(USERS)?;
            let removed: Option<StoredUser> = match users.remove(user_id)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            if let Some(user) = &removed {
                let mut emails = write_txn.open_table(USER_EMAILS)?;
                emails.remove(email_key(&user.email).as_str())?;
            }
            removed.is_some()
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Whether the database can serve a read transaction.
    pub fn is_healthy(&self) -> bool {
        match self.db.begin_read() {
            Ok(txn) => txn.open_table(USERS).is_ok(),
            Err(_) => false,
        }
    }
}
