// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims carried by every access token.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// `iat + ttl` does not fit a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("token lifetime of {ttl_secs}s from {issued_at} is out of range")]
pub struct ExpiryOutOfRange {
    pub issued_at: i64,
    pub ttl_secs: i64,
}

/// Claims encoded in an access token.
///
/// Standard registered claims plus the subject's `roles`. Claims are never
/// persisted: they are built at login (or by the admin CLI), signed into a
/// token, and rebuilt from that token on every authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Subject (user ID)
    pub sub: String,
    /// Audience
    pub aud: String,
    /// Expiration timestamp (Unix seconds)
    pub exp: i64,
    /// Issued at timestamp (Unix seconds)
    pub iat: i64,
    /// Roles held by the subject
    pub roles: Vec<Role>,
}

impl Claims {
    /// Build claims issued at `now` and valid for `ttl`.
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        audience: impl Into<String>,
        roles: Vec<Role>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, ExpiryOutOfRange> {
        let expires = now
            .checked_add_signed(ttl)
            .ok_or_else(|| ExpiryOutOfRange {
                issued_at: now.timestamp(),
                ttl_secs: ttl.num_seconds(),
            })?;

        Ok(Self {
            iss: issuer.into(),
            sub: subject.into(),
            aud: audience.into(),
            exp: expires.timestamp(),
            iat: now.timestamp(),
            roles,
        })
    }

    /// Returns true if the claims hold at least one of the required roles.
    ///
    /// An empty `required` set authorizes nobody.
    pub fn authorized(&self, required: &[Role]) -> bool {
        required.iter().any(|role| self.roles.contains(role))
    }

    /// Check if these claims carry the admin role.
    pub fn is_admin(&self) -> bool {
        self.authorized(&[Role::Admin])
    }

    /// Check if the subject may act on the account identified by `user_id`:
    /// either it is their own account or they are an admin.
    pub fn can_access(&self, user_id: &str) -> bool {
        self.is_admin() || self.sub == user_id
    }

    /// Whether the claims are expired at `now` (Unix seconds).
    ///
    /// The boundary is exclusive: a token whose `exp` equals `now` is expired.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }
}
