// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operations behind the `account-admin` binary.
//!
//! They work on the database file directly and call the same
//! [`UserService`] as the HTTP handlers, acting with internal admin claims.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};

use crate::auth::authenticator::parse_algorithm;
use crate::auth::keystore::load_signing_key;
use crate::auth::{Auth, Claims, Role, SigningKeys, StaticKeyStore};
use crate::config::DEFAULT_KEY_ID;
use crate::context::RequestContext;
use crate::storage::UserDatabase;
use crate::users::{NewUserRequest, User, UserManager, UserService, TOKEN_AUDIENCE};

/// Issuer of tokens minted by the admin tool.
pub const ADMIN_TOKEN_ISSUER: &str = "service project";

/// Lifetime of minted tokens (8760h).
pub const ADMIN_TOKEN_TTL_HOURS: i64 = 8760;

fn admin_context(now: DateTime<Utc>) -> RequestContext {
    RequestContext::new(uuid::Uuid::new_v4().to_string(), now)
}

/// Claims the tool acts with when calling the user service.
fn internal_admin_claims(subject: &str, now: DateTime<Utc>) -> anyhow::Result<Claims> {
    Claims::new(
        ADMIN_TOKEN_ISSUER,
        subject,
        TOKEN_AUDIENCE,
        vec![Role::Admin],
        now,
        Duration::minutes(5),
    )
    .context("building internal claims")
}

/// Mint a long-lived token for an existing user, signed under
/// [`DEFAULT_KEY_ID`] with the key in `private_key_file`.
pub async fn gen_token(
    db: Arc<UserDatabase>,
    user_id: &str,
    private_key_file: &Path,
    algorithm: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<String> {
    let users = UserManager::new(db);
    let user = users
        .get_by_id(&admin_context(now), &internal_admin_claims(user_id, now)?, user_id)
        .await
        .context("retrieve user")?;

    let signing_key = load_signing_key(private_key_file, parse_algorithm(algorithm)?)
        .with_context(|| format!("reading key file {}", private_key_file.display()))?;
    let mut keys = SigningKeys::new();
    keys.insert(DEFAULT_KEY_ID.to_string(), signing_key);
    let lookup = StaticKeyStore::from_signing_keys(&keys);
    let auth = Auth::new(algorithm, lookup, keys).context("constructing auth")?;

    let claims = Claims::new(
        ADMIN_TOKEN_ISSUER,
        user.id,
        TOKEN_AUDIENCE,
        user.roles,
        now,
        Duration::hours(ADMIN_TOKEN_TTL_HOURS),
    )
    .context("building token claims")?;
    auth.generate_token(DEFAULT_KEY_ID, &claims)
        .context("generating token")
}

/// Frame a token the way `gentoken` prints it.
pub fn format_token_block(token: &str) -> String {
    format!("-----BEGIN TOKEN-----\n{token}\n-----END TOKEN-----")
}

/// Create an account holding both `ADMIN` and `USER`.
pub async fn user_add(
    db: Arc<UserDatabase>,
    email: &str,
    password: &str,
    bcrypt_cost: u32,
) -> anyhow::Result<User> {
    let now = Utc::now();
    let users = UserManager::new(db).with_bcrypt_cost(bcrypt_cost);
    let request = NewUserRequest {
        name: String::new(),
        email: email.to_string(),
        last_name: String::new(),
        country: String::new(),
        roles: vec![Role::Admin, Role::User],
        password: password.to_string(),
        password_confirm: password.to_string(),
    };

    let claims = internal_admin_claims("account-admin", now)?;
    users
        .create(&admin_context(now), Some(&claims), request)
        .await
        .context("create user")
}

/// Insert the seed accounts. Returns how many were new.
pub fn seed(db: &UserDatabase) -> anyhow::Result<usize> {
    crate::storage::seed(db).context("seeding users")
}
