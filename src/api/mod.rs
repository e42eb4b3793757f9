// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::Request,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{authenticate, authorize, Claims, RequiredRoles, Role},
    context::{fault_guard, request_context, REQUEST_ID_HEADER},
    error::{ErrorBody, FieldError},
    state::AppState,
    users::{LoginRequest, NewUserRequest, TokenResponse, UpdateUserRequest, User},
};

pub mod extract;
pub mod health;
pub mod prometheus;
pub mod users;

pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/v1/users/{page}/{rows}", get(users::list_users))
        .route_layer(from_fn_with_state(
            RequiredRoles::new([Role::Admin]),
            authorize,
        ))
        .route_layer(from_fn_with_state(state.auth.clone(), authenticate));

    let authenticated_routes = Router::new()
        .route("/v1/users/me", get(users::me))
        .route(
            "/v1/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route_layer(from_fn_with_state(state.auth.clone(), authenticate));

    let public_routes = Router::new()
        .route("/v1/users", post(users::create_user))
        .route("/v1/users/token/{kid}", post(users::login))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(prometheus::render));

    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        let request_id = request
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        tracing::info_span!(
            "http.request",
            method = %request.method(),
            uri = %request.uri(),
            request_id
        )
    });

    let shutdown = state.shutdown.clone();

    Router::new()
        .merge(admin_routes)
        .merge(authenticated_routes)
        .merge(public_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(from_fn(request_context))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(trace_layer)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(from_fn_with_state(shutdown, fault_guard))
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        users::list_users,
        users::login,
        users::me,
        users::get_user,
        users::update_user,
        users::delete_user,
        users::create_user,
        health::liveness,
        health::readiness,
        prometheus::render
    ),
    components(
        schemas(
            User,
            Claims,
            Role,
            NewUserRequest,
            UpdateUserRequest,
            LoginRequest,
            TokenResponse,
            ErrorBody,
            FieldError,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Users", description = "User accounts and login"),
        (name = "Health", description = "Health checks and metrics")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::keystore::tests::TEST_RSA_PEM;
    use crate::auth::{Auth, SigningKey, SigningKeys, StaticKeyStore};
    use crate::config::MIN_BCRYPT_COST;
    use crate::storage::{UserDatabase, SEED_ADMIN_ID, SEED_USER_ID};
    use crate::users::{RequestValidator, UserManager, UserService};
    use axum::{
        body::{to_bytes, Body},
        http::{Method, StatusCode},
        response::Response,
    };
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";

    struct TestApp {
        router: Router,
        state: AppState,
        _dir: tempfile::TempDir,
    }

    fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(UserDatabase::open(&dir.path().join("users.redb")).unwrap());
        crate::storage::seed(&db).unwrap();

        let mut keys = SigningKeys::new();
        keys.insert(KID.to_string(), SigningKey::rsa_from_pem(TEST_RSA_PEM).unwrap());
        let lookup = StaticKeyStore::from_signing_keys(&keys);
        let auth = Arc::new(Auth::new("RS256", lookup, keys).unwrap());

        let manager = UserManager::new(db.clone()).with_bcrypt_cost(MIN_BCRYPT_COST);
        let users: Arc<dyn UserService> = Arc::new(manager);
        let state = AppState::new(auth, users, db, RequestValidator::new());

        TestApp {
            router: router(state.clone()),
            state,
            _dir: dir,
        }
    }

    async fn send(
        app: &TestApp,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        app.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(app: &TestApp, email: &str) -> String {
        let response = send(
            app,
            Method::POST,
            &format!("/v1/users/token/{KID}"),
            None,
            Some(json!({ "email": email, "password": "password" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn liveness_is_public() {
        let app = test_app();
        let response = send(&app, Method::GET, "/health/live", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn readiness_reports_database() {
        let app = test_app();
        let response = send(&app, Method::GET, "/health/ready", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["checks"]["database"], "ok");
        assert!(body["checks"].get("jwks").is_none());
    }

    #[tokio::test]
    async fn request_id_is_propagated() {
        let app = test_app();
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn login_then_me() {
        let app = test_app();
        let token = login(&app, "user@example.com").await;

        let response = send(&app, Method::GET, "/v1/users/me", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let claims = body_json(response).await;
        assert_eq!(claims["sub"], SEED_USER_ID);
        assert_eq!(claims["roles"], json!(["USER"]));
    }

    #[tokio::test]
    async fn login_failures() {
        let app = test_app();

        let wrong = send(
            &app,
            Method::POST,
            &format!("/v1/users/token/{KID}"),
            None,
            Some(json!({ "email": "user@example.com", "password": "nope" })),
        )
        .await;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let unknown_kid = send(
            &app,
            Method::POST,
            "/v1/users/token/other-kid",
            None,
            Some(json!({ "email": "user@example.com", "password": "password" })),
        )
        .await;
        assert_eq!(unknown_kid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(unknown_kid).await["error"], "unknown key id");
    }

    #[tokio::test]
    async fn list_requires_admin() {
        let app = test_app();

        let anonymous = send(&app, Method::GET, "/v1/users/1/10", None, None).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let user_token = login(&app, "user@example.com").await;
        let as_user = send(&app, Method::GET, "/v1/users/1/10", Some(&user_token), None).await;
        assert_eq!(as_user.status(), StatusCode::FORBIDDEN);

        let admin_token = login(&app, "admin@example.com").await;
        let as_admin = send(&app, Method::GET, "/v1/users/1/10", Some(&admin_token), None).await;
        assert_eq!(as_admin.status(), StatusCode::OK);
        let users = body_json(as_admin).await;
        assert_eq!(users.as_array().unwrap().len(), 2);

        let bad_page = send(&app, Method::GET, "/v1/users/x/10", Some(&admin_token), None).await;
        assert_eq!(bad_page.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn users_only_see_themselves() {
        let app = test_app();
        let token = login(&app, "user@example.com").await;

        let own = send(
            &app,
            Method::GET,
            &format!("/v1/users/{SEED_USER_ID}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(own.status(), StatusCode::OK);
        assert!(body_json(own).await.get("password_hash").is_none());

        let other = send(
            &app,
            Method::GET,
            &format!("/v1/users/{SEED_ADMIN_ID}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(other.status(), StatusCode::FORBIDDEN);

        let malformed = send(&app, Method::GET, "/v1/users/not-a-uuid", Some(&token), None).await;
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_update_delete() {
        let app = test_app();

        let created = send(
            &app,
            Method::POST,
            "/v1/users",
            None,
            Some(json!({
                "name": "Ada",
                "email": "ada@example.com",
                "last_name": "Lovelace",
                "country": "UK",
                "password": "password",
                "password_confirm": "password"
            })),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let id = body_json(created).await["id"].as_str().unwrap().to_string();

        let token = login(&app, "ada@example.com").await;
        let updated = send(
            &app,
            Method::PUT,
            &format!("/v1/users/{id}"),
            Some(&token),
            Some(json!({ "last_name": "King", "country": "GB" })),
        )
        .await;
        assert_eq!(updated.status(), StatusCode::OK);
        assert_eq!(body_json(updated).await["last_name"], "King");

        let deleted = send(&app, Method::DELETE, &format!("/v1/users/{id}"), Some(&token), None).await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn registration_payload_errors() {
        let app = test_app();

        let unknown_field = send(
            &app,
            Method::POST,
            "/v1/users",
            None,
            Some(json!({ "name": "Ada", "is_admin": true })),
        )
        .await;
        assert_eq!(unknown_field.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(unknown_field).await["error"], "unable to decode payload");

        let admin_grant = send(
            &app,
            Method::POST,
            "/v1/users",
            None,
            Some(json!({
                "name": "Eve",
                "email": "eve@example.com",
                "last_name": "Hacker",
                "country": "US",
                "roles": ["ADMIN"],
                "password": "password",
                "password_confirm": "password"
            })),
        )
        .await;
        assert_eq!(admin_grant.status(), StatusCode::FORBIDDEN);

        let invalid_fields = send(
            &app,
            Method::POST,
            "/v1/users",
            None,
            Some(json!({
                "name": "",
                "email": "not-an-email",
                "last_name": "Lovelace",
                "country": "UK",
                "password": "password",
                "password_confirm": "different"
            })),
        )
        .await;
        assert_eq!(invalid_fields.status(), StatusCode::BAD_REQUEST);
        let body = body_json(invalid_fields).await;
        assert_eq!(body["error"], "field validation error");
        let fields: Vec<&str> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["name", "email", "password_confirm"]);

        let bad_token = send(
            &app,
            Method::POST,
            "/v1/users",
            Some("garbage"),
            Some(json!({})),
        )
        .await;
        assert_eq!(bad_token.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn role_names_ignore_case() {
        let app = test_app();
        let registration = |email: &str, role: &str| {
            json!({
                "name": "Ada",
                "email": email,
                "last_name": "Lovelace",
                "country": "UK",
                "roles": [role],
                "password": "password",
                "password_confirm": "password"
            })
        };

        let created = send(
            &app,
            Method::POST,
            "/v1/users",
            None,
            Some(registration("ada@example.com", "user")),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(body_json(created).await["roles"], json!(["USER"]));

        let escalation = send(
            &app,
            Method::POST,
            "/v1/users",
            None,
            Some(registration("eve@example.com", "admin")),
        )
        .await;
        assert_eq!(escalation.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn malformed_header_is_rejected() {
        let app = test_app();
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/users/me")
                    .header("authorization", "Token abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!app.state.shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = test_app();
        let response = send(&app, Method::GET, "/api-doc/openapi.json", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let doc = body_json(response).await;
        assert!(doc["paths"].get("/v1/users/{page}/{rows}").is_some());
        assert!(doc["paths"].get("/metrics").is_some());
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_recorder() {
        let app = test_app();
        let disabled = send(&app, Method::GET, "/metrics", None, None).await;
        assert_eq!(disabled.status(), StatusCode::NOT_FOUND);

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("user_service_requests_total", "method" => "authenticate")
                .increment(1);
        });

        let enabled = router(app.state.clone().with_metrics(handle))
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(enabled.status(), StatusCode::OK);
        assert_eq!(
            enabled.headers()["content-type"],
            prometheus::PROMETHEUS_CONTENT_TYPE
        );
        let bytes = to_bytes(enabled.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains(r#"user_service_requests_total{method="authenticate"} 1"#));
    }
}
