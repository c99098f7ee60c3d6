// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{
        authenticate, authorize, AuthError, AuthenticatedUser, Role, RolePolicy, ROLE_ADMIN,
        ROLE_MODERATOR, ROLE_USER,
    },
    error::ApiError,
    models::{AuthResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest},
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod health;
pub mod insights;
pub mod secure;
pub mod users;

/// Run a synchronous auth or storage call off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::from)
}

fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins.iter().cloned()))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn policy<S: Clone + Send + Sync + 'static>(router: Router<S>, policy: RolePolicy) -> Router<S> {
    router.route_layer(from_fn_with_state(policy, authorize))
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/api/secure/public", get(secure::public_access));

    let authenticated = policy(
        Router::new()
            .route("/users/me", get(users::get_current_user))
            .route("/api/test/hello", get(secure::hello)),
        RolePolicy::authenticated(),
    );

    let members = policy(
        Router::new()
            .route("/api/secure/user", get(secure::user_access))
            .route("/user/profile", get(secure::user_profile))
            .route(
                "/api/insights/upload-audio",
                post(insights::upload_audio)
                    .layer(DefaultBodyLimit::max(state.max_upload_bytes)),
            ),
        RolePolicy::any_of([ROLE_USER, ROLE_ADMIN]),
    );

    let moderators = policy(
        Router::new().route("/api/secure/moderator", get(secure::moderator_access)),
        RolePolicy::any_of([ROLE_MODERATOR]),
    );

    let any_role = policy(
        Router::new().route("/api/secure/all", get(secure::all_access)),
        RolePolicy::any_of([ROLE_USER, ROLE_ADMIN, ROLE_MODERATOR]),
    );

    let admins = policy(
        Router::new()
            .route("/api/secure/admin", get(secure::admin_access))
            .route("/admin/dashboard", get(admin::dashboard))
            .route("/admin/roles", get(admin::list_roles))
            .route("/admin/users", get(admin::list_users))
            .route("/admin/users/{user_id}/roles", post(admin::grant_role)),
        RolePolicy::any_of([ROLE_ADMIN]),
    );

    let validator = state.validator();
    let cors = cors_layer(&state.cors_allowed_origins);

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(members)
        .merge(moderators)
        .merge(any_role)
        .merge(admins)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(from_fn_with_state(validator, authenticate))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
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
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::register,
        auth::login,
        auth::refresh,
        users::get_current_user,
        secure::public_access,
        secure::user_access,
        secure::admin_access,
        secure::moderator_access,
        secure::all_access,
        secure::hello,
        secure::user_profile,
        insights::upload_audio,
        admin::dashboard,
        admin::list_roles,
        admin::list_users,
        admin::grant_role
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            AuthResponse,
            MessageResponse,
            AuthenticatedUser,
            Role,
            users::UserMeResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            insights::InsightsResponse,
            insights::UploadAudioForm,
            admin::DashboardResponse,
            admin::AdminUserSummary,
            admin::AdminUserListResponse,
            admin::RoleListResponse,
            admin::GrantRoleRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Registration, login and token refresh"),
        (name = "Users", description = "Current identity"),
        (name = "Secure", description = "Role-gated content"),
        (name = "Insights", description = "Meeting audio insights"),
        (name = "Admin", description = "Administration (ROLE_ADMIN)")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenType;
    use crate::providers::InsightClient;
    use crate::test_support;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, username: &str, email: &str, password: &str) -> Response {
        send(
            app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": username, "email": email, "password": password })),
        )
        .await
    }

    async fn login(app: &Router, identifier: &str, password: &str) -> Response {
        send(
            app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "identifier": identifier, "password": password })),
        )
        .await
    }

    async fn access_token(app: &Router, identifier: &str, password: &str) -> String {
        let response = login(app, identifier, password).await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn register_login_and_role_checks_end_to_end() {
        let (state, _dir) = test_support::app_state();
        let app = router(state);

        let response = register(&app, "alice", "alice@x.com", "pw123").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let registered = body_json(response).await;
        assert_eq!(registered["roles"], json!(["ROLE_USER"]));
        assert_eq!(registered["token_type"], "Bearer");

        let token = access_token(&app, "alice@x.com", "pw123").await;

        let response = send(&app, Method::GET, "/api/secure/admin", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error_code"], "forbidden");

        let response = send(&app, Method::GET, "/api/secure/user", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, Method::GET, "/user/profile", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, Method::GET, "/api/secure/all", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, Method::GET, "/api/secure/moderator", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&app, Method::GET, "/users/me", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let me = body_json(response).await;
        assert_eq!(me["subject"], "alice");
        assert_eq!(me["roles"], json!(["ROLE_USER"]));
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let (state, _dir) = test_support::app_state();
        let app = router(state);

        for uri in ["/api/secure/user", "/api/test/hello", "/admin/dashboard", "/users/me"] {
            let response = send(&app, Method::GET, uri, None, None).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body_json(response).await["error_code"], "unauthenticated");
        }

        let response = send(&app, Method::GET, "/api/secure/public", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn expired_and_tampered_tokens_are_rejected() {
        let (state, _dir) = test_support::app_state();
        let issuer = state.auth.issuer().clone();
        let app = router(state);

        register(&app, "alice", "alice@x.com", "pw123").await;
        let roles = vec![ROLE_USER.to_string()];

        let expired = issuer
            .issue_at(
                "alice",
                &roles,
                Duration::hours(1),
                TokenType::Access,
                Utc::now().timestamp() - 7200,
            )
            .unwrap();
        let response = send(&app, Method::GET, "/api/secure/user", Some(&expired), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let token = access_token(&app, "alice", "pw123").await;
        let (head, signature) = token.rsplit_once('.').unwrap();
        let replacement = if signature.starts_with('A') { "B" } else { "A" };
        let tampered = format!("{head}.{replacement}{}", &signature[1..]);
        let response = send(&app, Method::GET, "/api/secure/user", Some(&tampered), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&app, Method::GET, "/api/secure/user", Some("not-a-token"), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn failed_logins_are_indistinguishable() {
        let (state, _dir) = test_support::app_state();
        let app = router(state);
        register(&app, "alice", "alice@x.com", "pw123").await;

        let wrong_password = login(&app, "alice", "nope").await;
        let unknown_user = login(&app, "ghost", "nope").await;
        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);

        let a = body_json(wrong_password).await;
        let b = body_json(unknown_user).await;
        assert_eq!(a, b);
        assert_eq!(a["error_code"], "invalid_credentials");
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let (state, _dir) = test_support::app_state();
        let app = router(state);

        let first = register(&app, "alice", "alice@x.com", "pw123").await;
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = register(&app, "alice2", "ALICE@x.com", "pw456").await;
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(second).await["error_code"], "duplicate_identity");
    }

    #[tokio::test]
    async fn invalid_registration_is_a_validation_error() {
        let (state, _dir) = test_support::app_state();
        let app = router(state);

        let response = register(&app, "", "alice@x.com", "pw123").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error_code"], "validation_error");
    }

    #[tokio::test]
    async fn refresh_and_access_tokens_are_not_interchangeable() {
        let (state, _dir) = test_support::app_state();
        let app = router(state);

        let registered = body_json(register(&app, "alice", "alice@x.com", "pw123").await).await;
        let access = registered["token"].as_str().unwrap().to_string();
        let refresh = registered["refresh_token"].as_str().unwrap().to_string();

        let response = send(&app, Method::GET, "/api/secure/user", Some(&refresh), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &app,
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": access })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &app,
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let refreshed = body_json(response).await;
        let token = refreshed["token"].as_str().unwrap();
        let response = send(&app, Method::GET, "/api/secure/user", Some(token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_grants_role_that_applies_on_next_login() {
        let (state, _dir) = test_support::app_state();
        let auth = state.auth.clone();
        let app = router(state);

        let alice = body_json(register(&app, "alice", "alice@x.com", "pw123").await).await;
        let alice_id = alice["user_id"].as_str().unwrap().to_string();
        let alice_token = alice["token"].as_str().unwrap().to_string();
        auth.bootstrap_admin("root", "root@x.com", "rootpw").unwrap();
        let admin_token = access_token(&app, "root", "rootpw").await;

        let response = send(&app, Method::GET, "/admin/dashboard", Some(&admin_token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["total_users"], 2);

        let uri = format!("/admin/users/{alice_id}/roles");
        let response = send(
            &app,
            Method::POST,
            &uri,
            Some(&alice_token),
            Some(json!({ "role": ROLE_MODERATOR })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(
            &app,
            Method::POST,
            &uri,
            Some(&admin_token),
            Some(json!({ "role": ROLE_MODERATOR })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert!(updated.get("password_hash").is_none());

        let response = send(&app, Method::GET, "/api/secure/moderator", Some(&alice_token), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let fresh = access_token(&app, "alice", "pw123").await;
        let response = send(&app, Method::GET, "/api/secure/moderator", Some(&fresh), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, Method::GET, "/admin/users", Some(&admin_token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["total"], 2);
    }

    #[tokio::test]
    async fn granting_unknown_user_is_not_found() {
        let (state, _dir) = test_support::app_state();
        let auth = state.auth.clone();
        let app = router(state);
        auth.bootstrap_admin("root", "root@x.com", "rootpw").unwrap();
        let admin_token = access_token(&app, "root", "rootpw").await;

        let response = send(
            &app,
            Method::POST,
            "/admin/users/missing/roles",
            Some(&admin_token),
            Some(json!({ "role": ROLE_MODERATOR })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn granting_unknown_role_is_a_validation_error() {
        let (state, _dir) = test_support::app_state();
        let auth = state.auth.clone();
        let app = router(state);
        let alice = body_json(register(&app, "alice", "alice@x.com", "pw123").await).await;
        let alice_id = alice["user_id"].as_str().unwrap().to_string();
        auth.bootstrap_admin("root", "root@x.com", "rootpw").unwrap();
        let admin_token = access_token(&app, "root", "rootpw").await;

        let response = send(
            &app,
            Method::POST,
            &format!("/admin/users/{alice_id}/roles"),
            Some(&admin_token),
            Some(json!({ "role": "ROLE_MODERTOR" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error_code"], "validation_error");
    }

    async fn upload(app: &Router, token: &str) -> Response {
        let body = "--BOUNDARY\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"meeting.wav\"\r\n\
            Content-Type: audio/wav\r\n\r\n\
            RIFF0000WAVE\r\n\
            --BOUNDARY--\r\n";
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/insights/upload-audio")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn app_with_insights(server: &mockito::ServerGuard) -> (Router, String, tempfile::TempDir) {
        let (state, dir) = test_support::app_state();
        let client = InsightClient::new(
            &format!("{}/v1beta", server.url()),
            "gemini-1.5-pro",
            "test-key",
        )
        .unwrap();
        let app = router(state.with_insights(client));
        let registered = body_json(register(&app, "alice", "alice@x.com", "pw123").await).await;
        let token = registered["token"].as_str().unwrap().to_string();
        (app, token, dir)
    }

    #[tokio::test]
    async fn upload_without_insight_client_is_unavailable() {
        let (state, _dir) = test_support::app_state();
        let app = router(state);
        let registered = body_json(register(&app, "alice", "alice@x.com", "pw123").await).await;
        let token = registered["token"].as_str().unwrap();

        let response = upload(&app, token).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["error_code"], "insights_unavailable");

        let response = send(&app, Method::POST, "/api/insights/upload-audio", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upload_returns_generated_insights() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(mockito::Matcher::Regex(r#""mime_type":"audio/wav""#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"- decided to ship"}]}}]}"#)
            .create_async()
            .await;
        let (app, token, _dir) = app_with_insights(&server).await;

        let response = upload(&app, &token).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["insights"], "- decided to ship");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upload_maps_service_failure_to_bad_gateway() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;
        let (app, token, _dir) = app_with_insights(&server).await;

        let response = upload(&app, &token).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error_code"], "upstream_error");
        assert!(!body["error"].as_str().unwrap().contains("overloaded"));
    }

    #[tokio::test]
    async fn health_reports_seeded_database() {
        let (state, _dir) = test_support::app_state();
        let app = router(state);

        let response = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let health = body_json(response).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["checks"]["database"], "ok");
        assert_eq!(health["checks"]["insights"], "disabled");

        let response = send(&app, Method::GET, "/health/live", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let (state, _dir) = test_support::app_state();
        let app = router(state);

        let response = send(&app, Method::GET, "/health/live", None, None).await;
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn cors_allows_only_configured_origins() {
        let (state, _dir) = test_support::app_state();
        let app = router(
            state.with_cors_allowed_origins(vec![HeaderValue::from_static("http://localhost:5173")]),
        );

        for (origin, allowed) in [("http://localhost:5173", true), ("https://evil.example", false)] {
            let request = Request::builder()
                .uri("/health/live")
                .header(header::ORIGIN, origin)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
                allowed.then(|| HeaderValue::from_static("http://localhost:5173")).as_ref(),
                "{origin}"
            );
        }
    }

    #[test]
    fn openapi_declares_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer"));
        assert!(doc.paths.paths.contains_key("/auth/login"));
    }
}
