// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request context and the global middleware that manages it.
//!
//! [`request_context`] creates a [`RequestContext`] for every request and
//! stores it in the request extensions. The authenticate stage fills in
//! `claims`; handlers extract the whole context.
//!
//! [`fault_guard`] sits outside everything else and watches responses for an
//! [`IntegrityFault`] marker. When one appears it cancels the shutdown token,
//! which drains in-flight requests and stops the server.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderName},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::auth::Claims;
use crate::error::{ApiError, IntegrityFault};

/// Header carrying the request id (set by `SetRequestIdLayer`).
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Values shared by every stage handling one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request id, echoed back in the `x-request-id` response header
    pub trace_id: String,
    /// When the request entered the service
    pub now: DateTime<Utc>,
    /// Verified token claims, present once the request is authenticated
    pub claims: Option<Claims>,
}

impl RequestContext {
    pub fn new(trace_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            trace_id: trace_id.into(),
            now,
            claims: None,
        }
    }
}

/// Middleware creating the [`RequestContext`].
pub async fn request_context(mut request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestContext::new(trace_id, Utc::now()));
    next.run(request).await
}

/// Middleware turning an [`IntegrityFault`] response into a shutdown request.
pub async fn fault_guard(
    State(shutdown): State<CancellationToken>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    if let Some(fault) = response.extensions().get::<IntegrityFault>() {
        tracing::error!(
            %method,
            %path,
            reason = fault.reason(),
            "Integrity fault, shutting down"
        );
        shutdown.cancel();
    }
    response
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| ApiError::integrity("request context missing"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn echo_trace_id(ctx: RequestContext) -> String {
        ctx.trace_id
    }

    async fn read_body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn context_uses_request_id_header() {
        let app = Router::new()
            .route("/", get(echo_trace_id))
            .layer(middleware::from_fn(request_context));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "trace-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, "trace-123");
    }

    #[tokio::test]
    async fn context_generates_id_when_header_absent() {
        let app = Router::new()
            .route("/", get(echo_trace_id))
            .layer(middleware::from_fn(request_context));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = read_body(response).await;
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn missing_context_triggers_shutdown() {
        let shutdown = CancellationToken::new();
        let app = Router::new()
            .route("/", get(echo_trace_id))
            .layer(middleware::from_fn_with_state(shutdown.clone(), fault_guard));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn healthy_responses_leave_token_alone() {
        let shutdown = CancellationToken::new();
        let app = Router::new()
            .route("/", get(echo_trace_id))
            .layer(middleware::from_fn(request_context))
            .layer(middleware::from_fn_with_state(shutdown.clone(), fault_guard));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!shutdown.is_cancelled());
    }
}
