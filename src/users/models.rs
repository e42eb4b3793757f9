// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use super::validation::{password_length, required, RequestValidator};
use crate::auth::Role;
use crate::storage::StoredUser;

/// A user account as returned by the API. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    #[schema(example = "45b5fbd3-755f-4379-8f07-a58d4a30fa2f")]
    pub id: String,
    pub name: String,
    pub last_name: String,
    #[schema(example = "user@example.com")]
    pub email: String,
    pub country: String,
    pub roles: Vec<Role>,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

impl From<StoredUser> for User {
    fn from(stored: StoredUser) -> Self {
        Self {
            id: stored.id,
            name: stored.name,
            last_name: stored.last_name,
            email: stored.email,
            country: stored.country,
            roles: stored.roles,
            date_created: stored.date_created,
            date_updated: stored.date_updated,
        }
    }
}

/// Registration payload.
#[derive(Clone, Deserialize, ToSchema, garde::Validate)]
#[serde(deny_unknown_fields)]
#[garde(context(RequestValidator))]
pub struct NewUserRequest {
    #[garde(custom(required))]
    pub name: String,
    #[garde(custom(required), email)]
    pub email: String,
    #[garde(custom(required))]
    pub last_name: String,
    #[garde(custom(required))]
    pub country: String,
    /// Defaults to `["USER"]` when omitted or empty
    #[serde(default)]
    #[garde(skip)]
    pub roles: Vec<Role>,
    #[garde(custom(password_length))]
    pub password: String,
    #[garde(matches(password))]
    pub password_confirm: String,
}

impl std::fmt::Debug for NewUserRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUserRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("last_name", &self.last_name)
            .field("country", &self.country)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

/// Update payload. `name` and `email` are only changed when present and
/// non-empty; `last_name` and `country` are always replaced.
#[derive(Debug, Clone, Deserialize, ToSchema, garde::Validate)]
#[serde(deny_unknown_fields)]
#[garde(context(RequestValidator))]
pub struct UpdateUserRequest {
    #[serde(default, deserialize_with = "empty_as_none")]
    #[garde(skip)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[garde(email)]
    pub email: Option<String>,
    #[garde(custom(required))]
    pub last_name: String,
    #[garde(custom(required))]
    pub country: String,
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

/// Login payload.
#[derive(Clone, Deserialize, ToSchema, garde::Validate)]
#[serde(deny_unknown_fields)]
#[garde(context(RequestValidator))]
pub struct LoginRequest {
    #[schema(example = "user@example.com")]
    #[garde(custom(required))]
    pub email: String,
    #[garde(length(min = 1))]
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Signed access token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}
