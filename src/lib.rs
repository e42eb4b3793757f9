// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account Service - User Accounts REST API
//!
//! Registration, login and account management guarded by signed bearer
//! tokens (JWT) with role and ownership based access control.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and router (Axum)
//! - `auth` - Token issuance, validation and access-control middleware
//! - `users` - User service, request models and validation
//! - `storage` - Embedded user database (redb)
//! - `admin` - Operations behind the `account-admin` CLI

pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod shutdown;
pub mod state;
pub mod storage;
pub mod users;
