// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User CRUD and login.
//!
//! ## Access control
//!
//! `get_by_id`, `update` and `delete` only act on the caller's own account
//! unless the caller is an admin. The check runs right after the id is
//! parsed, before any record is loaded, so a non-owner learns nothing about
//! whether the account exists.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::instrument;
use uuid::Uuid;

use super::models::{NewUserRequest, UpdateUserRequest, User};
use crate::auth::{Claims, ExpiryOutOfRange, Role};
use crate::context::RequestContext;
use crate::storage::{StoredUser, UserDatabase, UserDbError};

/// Issuer of login tokens.
pub const TOKEN_ISSUER: &str = "service template";

/// Audience of login tokens.
pub const TOKEN_AUDIENCE: &str = "clients";

/// Default lifetime of login tokens, in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Errors returned by [`UserService`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,
    #[error("ID is not in its proper form")]
    InvalidId,
    #[error("page and rows must be at least 1")]
    InvalidPage,
    #[error("email already in use")]
    DuplicatedEmail,
    #[error("authentication failed")]
    AuthenticationFailure,
    #[error("attempted action is not allowed")]
    Forbidden,
    #[error("storage error: {0}")]
    Storage(UserDbError),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error(transparent)]
    TokenLifetime(#[from] ExpiryOutOfRange),
}

impl From<UserDbError> for ServiceError {
    fn from(err: UserDbError) -> Self {
        match err {
            UserDbError::DuplicateEmail(_) => ServiceError::DuplicatedEmail,
            UserDbError::NotFound(_) => ServiceError::NotFound,
            other => ServiceError::Storage(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// User account operations.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Register a user. Granting `ADMIN` requires admin `claims`.
    async fn create(
        &self,
        ctx: &RequestContext,
        claims: Option<&Claims>,
        request: NewUserRequest,
    ) -> ServiceResult<User>;

    /// One page of users ordered by id. `page` is 1-based.
    async fn get_all(&self, ctx: &RequestContext, page: u32, rows: u32) -> ServiceResult<Vec<User>>;

    async fn get_by_id(&self, ctx: &RequestContext, claims: &Claims, id: &str)
        -> ServiceResult<User>;

    async fn update(
        &self,
        ctx: &RequestContext,
        claims: &Claims,
        id: &str,
        request: UpdateUserRequest,
    ) -> ServiceResult<User>;

    /// Delete a user. Deleting an absent user succeeds.
    async fn delete(&self, ctx: &RequestContext, claims: &Claims, id: &str) -> ServiceResult<()>;

    /// Check credentials and build the claims for a login token.
    async fn authenticate(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> ServiceResult<Claims>;
}

/// [`UserService`] backed by the redb [`UserDatabase`].
#[derive(Clone)]
pub struct UserManager {
    db: Arc<UserDatabase>,
    bcrypt_cost: u32,
    token_ttl: Duration,
}

impl UserManager {
    pub fn new(db: Arc<UserDatabase>) -> Self {
        Self {
            db,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            token_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    async fn hash_password(&self, password: String) -> ServiceResult<String> {
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ServiceError::PasswordHash(e.to_string()))?
            .map_err(|e| ServiceError::PasswordHash(e.to_string()))
    }

    async fn verify_password(&self, password: String, hash: String) -> ServiceResult<bool> {
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| ServiceError::PasswordHash(e.to_string()))?
            .map_err(|e| ServiceError::PasswordHash(e.to_string()))
    }
}

/// Parse `id` and apply the ownership rule.
fn check_access(claims: &Claims, id: &str) -> ServiceResult<()> {
    Uuid::parse_str(id).map_err(|_| ServiceError::InvalidId)?;
    if !claims.can_access(id) {
        return Err(ServiceError::Forbidden);
    }
    Ok(())
}

#[async_trait]
impl UserService for UserManager {
    #[instrument(skip(self, ctx, claims, request), fields(trace_id = %ctx.trace_id))]
    async fn create(
        &self,
        ctx: &RequestContext,
        claims: Option<&Claims>,
        request: NewUserRequest,
    ) -> ServiceResult<User> {
        let mut roles = request.roles;
        if roles.is_empty() {
            roles.push(Role::User);
        }
        roles.sort();
        roles.dedup();

        if roles.contains(&Role::Admin) && !claims.is_some_and(Claims::is_admin) {
            tracing::warn!("Non-admin attempted to create an admin account");
            return Err(ServiceError::Forbidden);
        }

        if self.db.get_user_by_email(&request.email)?.is_some() {
            return Err(ServiceError::DuplicatedEmail);
        }

        let password_hash = self.hash_password(request.password).await?;
        let user = StoredUser {
            id: Uuid::new_v4().to_string(),
            name: request.name,
            last_name: request.last_name,
            email: request.email.trim().to_string(),
            country: request.country,
            roles,
            password_hash,
            date_created: ctx.now,
            date_updated: ctx.now,
        };

        self.db.insert_user(&user)?;
        tracing::info!(user_id = %user.id, "User created");
        Ok(user.into())
    }

    #[instrument(skip(self, ctx), fields(trace_id = %ctx.trace_id))]
    async fn get_all(&self, ctx: &RequestContext, page: u32, rows: u32) -> ServiceResult<Vec<User>> {
        if page == 0 || rows == 0 {
            return Err(ServiceError::InvalidPage);
        }
        let offset = (page as usize - 1).saturating_mul(rows as usize);

        let users = self.db.list_users(offset, rows as usize)?;
        Ok(users.into_iter().map(User::from).collect())
    }

    #[instrument(skip(self, ctx, claims), fields(trace_id = %ctx.trace_id, sub = %claims.sub))]
    async fn get_by_id(
        &self,
        ctx: &RequestContext,
        claims: &Claims,
        id: &str,
    ) -> ServiceResult<User> {
        check_access(claims, id)?;

        self.db
            .get_user(id)?
            .map(User::from)
            .ok_or(ServiceError::NotFound)
    }

    #[instrument(skip(self, ctx, claims, request), fields(trace_id = %ctx.trace_id, sub = %claims.sub))]
    async fn update(
        &self,
        ctx: &RequestContext,
        claims: &Claims,
        id: &str,
        request: UpdateUserRequest,
    ) -> ServiceResult<User> {
        check_access(claims, id)?;

        let mut user = self.db.get_user(id)?.ok_or(ServiceError::NotFound)?;

        if let Some(name) = request.name.filter(|n| !n.trim().is_empty()) {
            user.name = name;
        }
        if let Some(email) = request.email.filter(|e| !e.trim().is_empty()) {
            user.email = email.trim().to_string();
        }
        user.last_name = request.last_name;
        user.country = request.country;
        user.date_updated = ctx.now;

        self.db.update_user(&user)?;
        tracing::info!(user_id = %user.id, "User updated");
        Ok(user.into())
    }

    #[instrument(skip(self, ctx, claims), fields(trace_id = %ctx.trace_id, sub = %claims.sub))]
    async fn delete(&self, ctx: &RequestContext, claims: &Claims, id: &str) -> ServiceResult<()> {
        check_access(claims, id)?;

        if self.db.delete_user(id)? {
            tracing::info!(user_id = %id, "User deleted");
        }
        Ok(())
    }

    #[instrument(skip(self, ctx, password), fields(trace_id = %ctx.trace_id))]
    async fn authenticate(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> ServiceResult<Claims> {
        let Some(user) = self.db.get_user_by_email(email)? else {
            tracing::debug!("Login for unknown email");
            return Err(ServiceError::AuthenticationFailure);
        };

        if !self
            .verify_password(password.to_string(), user.password_hash)
            .await?
        {
            tracing::debug!(user_id = %user.id, "Login with wrong password");
            return Err(ServiceError::AuthenticationFailure);
        }

        Ok(Claims::new(
            TOKEN_ISSUER,
            user.id,
            TOKEN_AUDIENCE,
            user.roles,
            ctx.now,
            self.token_ttl,
        )?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::MIN_BCRYPT_COST;
    use crate::storage::{seed, SEED_ADMIN_ID, SEED_USER_ID};
    use chrono::Utc;

    /// Seeded manager with the cheapest bcrypt cost.
    pub(crate) fn test_manager() -> (UserManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = UserDatabase::open(&dir.path().join("users.redb")).unwrap();
        seed(&db).unwrap();
        let manager = UserManager::new(Arc::new(db)).with_bcrypt_cost(MIN_BCRYPT_COST);
        (manager, dir)
    }

    pub(crate) fn claims_for(sub: &str, roles: Vec<Role>) -> Claims {
        Claims::new(
            TOKEN_ISSUER,
            sub,
            TOKEN_AUDIENCE,
            roles,
            Utc::now(),
            Duration::hours(1),
        )
        .unwrap()
    }

    fn ctx() -> RequestContext {
        RequestContext::new("test-trace", Utc::now())
    }

    fn new_user(email: &str, roles: Vec<Role>) -> NewUserRequest {
        NewUserRequest {
            name: "Ada".to_string(),
            email: email.to_string(),
            last_name: "Lovelace".to_string(),
            country: "UK".to_string(),
            roles,
            password: "analytical".to_string(),
            password_confirm: "analytical".to_string(),
        }
    }

    #[tokio::test]
    async fn create_defaults_to_user_role() {
        let (svc, _dir) = test_manager();
        let user = svc
            .create(&ctx(), None, new_user("ada@example.com", vec![]))
            .await
            .unwrap();

        assert_eq!(user.roles, vec![Role::User]);
        assert!(Uuid::parse_str(&user.id).is_ok());
        assert_eq!(user.date_created, user.date_updated);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let (svc, _dir) = test_manager();
        let result = svc
            .create(&ctx(), None, new_user("User@Example.com", vec![]))
            .await;
        assert!(matches!(result, Err(ServiceError::DuplicatedEmail)));
    }

    #[tokio::test]
    async fn only_admins_grant_admin() {
        let (svc, _dir) = test_manager();

        let anonymous = svc
            .create(&ctx(), None, new_user("a@example.com", vec![Role::Admin]))
            .await;
        assert!(matches!(anonymous, Err(ServiceError::Forbidden)));

        let user = claims_for(SEED_USER_ID, vec![Role::User]);
        let as_user = svc
            .create(&ctx(), Some(&user), new_user("b@example.com", vec![Role::Admin]))
            .await;
        assert!(matches!(as_user, Err(ServiceError::Forbidden)));

        let admin = claims_for(SEED_ADMIN_ID, vec![Role::Admin, Role::User]);
        let created = svc
            .create(
                &ctx(),
                Some(&admin),
                new_user("c@example.com", vec![Role::User, Role::Admin]),
            )
            .await
            .unwrap();
        assert_eq!(created.roles, vec![Role::Admin, Role::User]);
    }

    #[tokio::test]
    async fn get_all_pages_from_one() {
        let (svc, _dir) = test_manager();

        let page = svc.get_all(&ctx(), 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        // Ids are ordered: "45b5..." sorts before "5cf3...".
        assert_eq!(page[0].id, SEED_USER_ID);

        let page = svc.get_all(&ctx(), 2, 1).await.unwrap();
        assert_eq!(page[0].id, SEED_ADMIN_ID);

        assert!(svc.get_all(&ctx(), 3, 1).await.unwrap().is_empty());
        assert_eq!(svc.get_all(&ctx(), 1, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn get_all_rejects_zero() {
        let (svc, _dir) = test_manager();
        assert!(matches!(
            svc.get_all(&ctx(), 0, 10).await,
            Err(ServiceError::InvalidPage)
        ));
        assert!(matches!(
            svc.get_all(&ctx(), 1, 0).await,
            Err(ServiceError::InvalidPage)
        ));
    }

    #[tokio::test]
    async fn ownership_rules_for_get_by_id() {
        let (svc, _dir) = test_manager();
        let user = claims_for(SEED_USER_ID, vec![Role::User]);
        let admin = claims_for(SEED_ADMIN_ID, vec![Role::Admin]);

        // Own account.
        assert_eq!(
            svc.get_by_id(&ctx(), &user, SEED_USER_ID).await.unwrap().id,
            SEED_USER_ID
        );
        // Someone else's account.
        assert!(matches!(
            svc.get_by_id(&ctx(), &user, SEED_ADMIN_ID).await,
            Err(ServiceError::Forbidden)
        ));
        // Admin reads anyone.
        assert!(svc.get_by_id(&ctx(), &admin, SEED_USER_ID).await.is_ok());
    }

    #[tokio::test]
    async fn get_by_id_error_order() {
        let (svc, _dir) = test_manager();
        let user = claims_for(SEED_USER_ID, vec![Role::User]);
        let admin = claims_for(SEED_ADMIN_ID, vec![Role::Admin]);
        let absent = Uuid::new_v4().to_string();

        assert!(matches!(
            svc.get_by_id(&ctx(), &admin, "not-a-uuid").await,
            Err(ServiceError::InvalidId)
        ));
        // A non-owner gets 403 whether or not the account exists.
        assert!(matches!(
            svc.get_by_id(&ctx(), &user, &absent).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            svc.get_by_id(&ctx(), &admin, &absent).await,
            Err(ServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_changes_fields() {
        let (svc, _dir) = test_manager();
        let user = claims_for(SEED_USER_ID, vec![Role::User]);
        let later = RequestContext::new("t", Utc::now() + Duration::seconds(5));

        let updated = svc
            .update(
                &later,
                &user,
                SEED_USER_ID,
                UpdateUserRequest {
                    name: None,
                    email: Some("renamed@example.com".to_string()),
                    last_name: "Updated".to_string(),
                    country: "Argentina".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Example");
        assert_eq!(updated.email, "renamed@example.com");
        assert_eq!(updated.last_name, "Updated");
        assert_eq!(updated.country, "Argentina");
        assert!(updated.date_updated > updated.date_created);
    }

    #[tokio::test]
    async fn update_to_taken_email_fails() {
        let (svc, _dir) = test_manager();
        let user = claims_for(SEED_USER_ID, vec![Role::User]);

        let result = svc
            .update(
                &ctx(),
                &user,
                SEED_USER_ID,
                UpdateUserRequest {
                    name: None,
                    email: Some("admin@example.com".to_string()),
                    last_name: "User".to_string(),
                    country: "Algeria".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::DuplicatedEmail)));
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_owned() {
        let (svc, _dir) = test_manager();
        let user = claims_for(SEED_USER_ID, vec![Role::User]);

        assert!(matches!(
            svc.delete(&ctx(), &user, SEED_ADMIN_ID).await,
            Err(ServiceError::Forbidden)
        ));
        svc.delete(&ctx(), &user, SEED_USER_ID).await.unwrap();
        svc.delete(&ctx(), &user, SEED_USER_ID).await.unwrap();

        let admin = claims_for(SEED_ADMIN_ID, vec![Role::Admin]);
        assert!(matches!(
            svc.get_by_id(&ctx(), &admin, SEED_USER_ID).await,
            Err(ServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn authenticate_builds_login_claims() {
        let (svc, _dir) = test_manager();
        let ctx = ctx();

        let claims = svc
            .authenticate(&ctx, "admin@example.com", "password")
            .await
            .unwrap();
        assert_eq!(claims.iss, TOKEN_ISSUER);
        assert_eq!(claims.aud, TOKEN_AUDIENCE);
        assert_eq!(claims.sub, SEED_ADMIN_ID);
        assert_eq!(claims.iat, ctx.now.timestamp());
        assert_eq!(claims.exp, ctx.now.timestamp() + 3600);
        assert!(claims.is_admin());
    }

    #[tokio::test]
    async fn authenticate_failures_look_the_same() {
        let (svc, _dir) = test_manager();
        assert!(matches!(
            svc.authenticate(&ctx(), "user@example.com", "wrong").await,
            Err(ServiceError::AuthenticationFailure)
        ));
        assert!(matches!(
            svc.authenticate(&ctx(), "nobody@example.com", "password").await,
            Err(ServiceError::AuthenticationFailure)
        ));
    }

    #[tokio::test]
    async fn created_user_can_log_in() {
        let (svc, _dir) = test_manager();
        svc.create(&ctx(), None, new_user("ada@example.com", vec![]))
            .await
            .unwrap();

        let claims = svc
            .authenticate(&ctx(), "ADA@example.com", "analytical")
            .await
            .unwrap();
        assert_eq!(claims.roles, vec![Role::User]);
    }

    #[tokio::test]
    async fn overflowing_token_lifetime_is_an_error() {
        let (svc, _dir) = test_manager();
        let svc = svc.with_token_ttl(Duration::seconds(9_223_372_036_854_775));
        assert!(matches!(
            svc.authenticate(&ctx(), "user@example.com", "password").await,
            Err(ServiceError::TokenLifetime(_))
        ));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn create_keeps_email_out_of_logs() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (svc, _dir) = test_manager();
        let user = svc
            .create(&ctx(), None, new_user("ada@example.com", vec![]))
            .await
            .unwrap();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("User created"));
        assert!(output.contains(&user.id));
        assert!(!output.contains("ada@example.com"));
    }
}
