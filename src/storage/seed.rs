// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Example accounts for development databases.
//!
//! Both accounts use the password `password`.

use chrono::{TimeZone, Utc};

use super::user_database::{StoredUser, UserDatabase, UserDbResult};
use crate::auth::Role;

/// Id of the seeded admin account.
pub const SEED_ADMIN_ID: &str = "5cf37266-3473-4006-984f-9325122678b7";

/// Id of the seeded regular account.
pub const SEED_USER_ID: &str = "45b5fbd3-755f-4379-8f07-a58d4a30fa2f";

/// bcrypt hash (cost 10) of `password`.
const SEED_PASSWORD_HASH: &str = "$2a$10$v79.Q7kMpIZFH0QYi.IoieRZikqOIr8a7Mo5Xk59sjeexFeuG22Oq";

/// The seed accounts.
pub fn seed_users() -> Vec<StoredUser> {
    let created = Utc.with_ymd_and_hms(2019, 3, 24, 0, 0, 0).single().unwrap_or_default();

    vec![
        StoredUser {
            id: SEED_ADMIN_ID.to_string(),
            name: "Example".to_string(),
            last_name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            country: "Albania".to_string(),
            roles: vec![Role::Admin, Role::User],
            password_hash: SEED_PASSWORD_HASH.to_string(),
            date_created: created,
            date_updated: created,
        },
        StoredUser {
            id: SEED_USER_ID.to_string(),
            name: "Example".to_string(),
            last_name: "User".to_string(),
            email: "user@example.com".to_string(),
            country: "Algeria".to_string(),
            roles: vec![Role::User],
            password_hash: SEED_PASSWORD_HASH.to_string(),
            date_created: created,
            date_updated: created,
        },
    ]
}

/// Insert the seed accounts that are not present yet.
///
/// Returns how many were inserted; running it twice is harmless.
pub fn seed(db: &UserDatabase) -> UserDbResult<usize> {
    let mut inserted = 0;
    for user in seed_users() {
        if db.insert_if_absent(&user)? {
            inserted += 1;
        }
    }
    tracing::info!(inserted, "Seeded user database");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db = UserDatabase::open(&dir.path().join("users.redb")).unwrap();

        assert_eq!(seed(&db).unwrap(), 2);
        assert_eq!(seed(&db).unwrap(), 0);

        let admin = db.get_user_by_email("admin@example.com").unwrap().unwrap();
        assert_eq!(admin.id, SEED_ADMIN_ID);
        assert_eq!(admin.roles, vec![Role::Admin, Role::User]);
    }

    #[test]
    fn seed_password_is_password() {
        let users = seed_users();
        assert!(bcrypt::verify("password", &users[0].password_hash).unwrap());
        assert!(!bcrypt::verify("wrong", &users[1].password_hash).unwrap());
    }
}
