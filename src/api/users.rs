// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.
//!
//! Which access-control stages guard each handler is decided in
//! [`super::router`]; handlers only see the outcome through their extractors.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::extract::ValidJson;
use crate::auth::{AuthClaims, Claims, OptionalAuth, SigningError};
use crate::context::RequestContext;
use crate::error::{ApiError, ErrorBody};
use crate::state::AppState;
use crate::users::{
    LoginRequest, NewUserRequest, ServiceError, TokenResponse, UpdateUserRequest, User,
};

/// List users one page at a time. Admin only.
#[utoipa::path(
    get,
    path = "/v1/users/{page}/{rows}",
    tag = "Users",
    security(("bearer" = [])),
    params(
        ("page" = u32, Path, description = "Page number, starting at 1"),
        ("rows" = u32, Path, description = "Rows per page")
    ),
    responses(
        (status = 200, description = "One page of users", body = [User]),
        (status = 400, description = "Invalid page or rows", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    )
)]
pub async fn list_users(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path((page, rows)): Path<(String, String)>,
) -> Result<Json<Vec<User>>, ApiError> {
    let page = page.parse().map_err(|_| ServiceError::InvalidPage)?;
    let rows = rows.parse().map_err(|_| ServiceError::InvalidPage)?;
    Ok(Json(state.users.get_all(&ctx, page, rows).await?))
}

/// Exchange email and password for a token signed under `kid`.
#[utoipa::path(
    post,
    path = "/v1/users/token/{kid}",
    tag = "Users",
    params(("kid" = String, Path, description = "Key id to sign with")),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed token", body = TokenResponse),
        (status = 400, description = "Invalid payload or unknown key id", body = ErrorBody),
        (status = 401, description = "Wrong email or password", body = ErrorBody)
    )
)]
pub async fn login(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(kid): Path<String>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let claims = state
        .users
        .authenticate(&ctx, &request.email, &request.password)
        .await?;

    let token = state
        .auth
        .generate_token(&kid, &claims)
        .map_err(|e| match e {
            SigningError::UnknownKid(_) => ApiError::bad_request("unknown key id"),
            other => ApiError::internal(other),
        })?;

    tracing::info!(trace_id = %ctx.trace_id, sub = %claims.sub, %kid, "Issued token");
    Ok(Json(TokenResponse { token }))
}

/// Claims of the token used for this request.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current claims", body = Claims),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn me(AuthClaims(claims): AuthClaims) -> Json<Claims> {
    Json(claims)
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, body = User),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 403, description = "Not the caller's account", body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_user(
    ctx: RequestContext,
    AuthClaims(claims): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users.get_by_id(&ctx, &claims, &id).await?))
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, body = User),
        (status = 400, description = "Malformed id, payload or taken email", body = ErrorBody),
        (status = 403, description = "Not the caller's account", body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn update_user(
    ctx: RequestContext,
    AuthClaims(claims): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(request): ValidJson<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users.update(&ctx, &claims, &id, request).await?))
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "Deleted, or already absent"),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 403, description = "Not the caller's account", body = ErrorBody)
    )
)]
pub async fn delete_user(
    ctx: RequestContext,
    AuthClaims(claims): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.users.delete(&ctx, &claims, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Register a user. A bearer token is optional; it is only needed to grant
/// the `ADMIN` role.
#[utoipa::path(
    post,
    path = "/v1/users",
    tag = "Users",
    request_body = NewUserRequest,
    responses(
        (status = 201, body = User),
        (status = 400, description = "Invalid payload or duplicate email", body = ErrorBody),
        (status = 401, description = "Invalid token", body = ErrorBody),
        (status = 403, description = "Granting ADMIN requires an admin token", body = ErrorBody)
    )
)]
pub async fn create_user(
    ctx: RequestContext,
    OptionalAuth(claims): OptionalAuth,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<NewUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.users.create(&ctx, claims.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}
