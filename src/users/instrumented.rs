// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Metrics decorator for any [`UserService`].
//!
//! Records through the `metrics` facade. The server binary installs a
//! Prometheus recorder and serves it on `GET /metrics`.
//!
//! - `user_service_requests_total{method}` (counter)
//! - `user_service_request_duration_seconds{method,success}` (histogram)

use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};

use super::models::{NewUserRequest, UpdateUserRequest, User};
use super::service::{ServiceResult, UserService};
use crate::auth::Claims;
use crate::context::RequestContext;

/// Wraps a [`UserService`] and records call counts and latency per method.
#[derive(Clone)]
pub struct InstrumentedUserService<S> {
    inner: S,
}

impl<S> InstrumentedUserService<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

async fn observe<T>(
    method: &'static str,
    call: impl Future<Output = ServiceResult<T>>,
) -> ServiceResult<T> {
    let begin = Instant::now();
    let result = call.await;

    let success = if result.is_ok() { "true" } else { "false" };
    counter!("user_service_requests_total", "method" => method).increment(1);
    histogram!(
        "user_service_request_duration_seconds",
        "method" => method,
        "success" => success
    )
    .record(begin.elapsed().as_secs_f64());

    result
}

#[async_trait]
impl<S: UserService> UserService for InstrumentedUserService<S> {
    async fn create(
        &self,
        ctx: &RequestContext,
        claims: Option<&Claims>,
        request: NewUserRequest,
    ) -> ServiceResult<User> {
        observe("create", self.inner.create(ctx, claims, request)).await
    }

    async fn get_all(&self, ctx: &RequestContext, page: u32, rows: u32) -> ServiceResult<Vec<User>> {
        observe("get_all", self.inner.get_all(ctx, page, rows)).await
    }

    async fn get_by_id(
        &self,
        ctx: &RequestContext,
        claims: &Claims,
        id: &str,
    ) -> ServiceResult<User> {
        observe("get_by_id", self.inner.get_by_id(ctx, claims, id)).await
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        claims: &Claims,
        id: &str,
        request: UpdateUserRequest,
    ) -> ServiceResult<User> {
        observe("update", self.inner.update(ctx, claims, id, request)).await
    }

    async fn delete(&self, ctx: &RequestContext, claims: &Claims, id: &str) -> ServiceResult<()> {
        observe("delete", self.inner.delete(ctx, claims, id)).await
    }

    async fn authenticate(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> ServiceResult<Claims> {
        observe("authenticate", self.inner.authenticate(ctx, email, password)).await
    }
}
