// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent user storage in an embedded redb database file.
//!
//! ## Storage Layout
//!
//! ```text
//! data/users.redb
//!   users        user_id -> StoredUser (JSON)
//!   user_emails  lowercase email -> user_id
//! ```
//!
//! Tables are created when the file is opened; there is no separate
//! migration step.

pub mod seed;
pub mod user_database;

pub use seed::{seed, seed_users, SEED_ADMIN_ID, SEED_USER_ID};
pub use user_database::{StoredUser, UserDatabase, UserDbError, UserDbResult};
