#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use lines_api::ApiServer;
use lines_core::config::{AdminConfig, AppConfig, AuthConfig};
use lines_management::ManagementState;
use lines_platform::{CaptureMailer, EmailKind};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const OPERATOR: &str = "palestine71023";
const OPERATOR_PASSWORD: &str = "operator-pass";

struct TestApp {
    router: Router,
    state: ManagementState,
    mailer: Arc<CaptureMailer>,
}

fn app() -> TestApp {
    let config = AppConfig {
        auth: AuthConfig {
            password_hash_cost: 4,
            ..Default::default()
        },
        admin: AdminConfig {
            email: Some("owner@lines.example".into()),
            username: Some(OPERATOR.into()),
            password: Some(OPERATOR_PASSWORD.into()),
            grant_ttl_hours: 8,
        },
        ..Default::default()
    };
    let mailer = Arc::new(CaptureMailer::new());
    let state = ManagementState::from_config(&config, mailer.clone()).unwrap();
    TestApp {
        router: ApiServer::router(state.clone()),
        state,
        mailer,
    }
}

async fn call(app: &TestApp, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
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
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn operator_token(app: &TestApp) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "identifier": OPERATOR, "password": OPERATOR_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
    body["token"].as_str().unwrap().to_string()
}

async fn user_token(app: &TestApp, email: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/v1/auth/signup",
        None,
        Some(json!({ "email": email, "password": "secret1", "confirm_password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["pending_email"], email);

    let code = app.mailer.last_code(email, EmailKind::SignupConfirmation).unwrap();
    let (status, body) = call(
        app,
        Method::POST,
        "/api/v1/auth/verify",
        None,
        Some(json!({ "email": email, "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn probes_respond() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["admin_gate_enabled"], true);
    let (status, _) = call(&app, Method::GET, "/live", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn operator_login_opens_the_tabbed_app() {
    let app = app();
    let token = operator_token(&app).await;
    let (status, body) = call(&app, Method::GET, "/api/v1/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "authenticated_admin");
    assert_eq!(body["view"], "tabbed_app");
    assert_eq!(body["identity"], OPERATOR);

    let (_, body) = call(&app, Method::GET, "/api/v1/session", None, None).await;
    assert_eq!(body["state"], "unauthenticated");
    assert_eq!(body["view"], "auth_form");
}

#[tokio::test]
async fn data_routes_require_operator() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/tiers/20/lines", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let user = user_token(&app, "user@lines.example").await;
    let (status, _) = call(&app, Method::GET, "/api/v1/dashboard", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, Method::GET, "/api/v1/waiting", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["contact_url"].as_str().unwrap().starts_with("https://wa.me/"));

    let (_, body) = call(&app, Method::GET, "/api/v1/session", Some(&user), None).await;
    assert_eq!(body["view"], "waiting_page");

    let (status, _) = call(&app, Method::GET, "/api/v1/waiting", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unconfirmed_account_cannot_sign_in() {
    let app = app();
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/auth/signup",
        None,
        Some(json!({ "email": "late@lines.example", "password": "secret1", "confirm_password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "late@lines.example", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "email_not_confirmed");
    assert_eq!(body["notification"]["title"], "Email not confirmed");
}

#[tokio::test]
async fn mismatched_signup_is_rejected_locally() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/auth/signup",
        None,
        Some(json!({ "email": "x@lines.example", "password": "secret1", "confirm_password": "secret2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn line_crud_and_dashboard() {
    let app = app();
    let token = operator_token(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/tiers/20/lines",
        Some(&token),
        Some(json!({ "mobile_number": "01012345678", "payment_status": "paid", "monthly_price": 120 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["record"]["id"], 1);
    assert_eq!(body["record"]["line_type"], "20");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/tiers/lines_60/lines",
        Some(&token),
        Some(json!({ "mobile_number": "01100000000", "payment_status": "لم يدفع" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, stats) = call(&app, Method::GET, "/api/v1/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["paid_customers"], 1);
    assert_eq!(stats["total_revenue"], 120.0);
    assert_eq!(stats["paid_percentage"], 50);

    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/v1/tiers/20/lines/1",
        Some(&token),
        Some(json!({ "mobile_number": "01012345678", "customer_name": "Omar", "monthly_price": 150 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["customer_name"], "Omar");
    assert_eq!(body["record"]["payment_status"], "unpaid");

    let (status, _) = call(&app, Method::PUT, "/api/v1/tiers/20/lines/99", Some(&token), Some(json!({ "mobile_number": "0" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::DELETE, "/api/v1/tiers/20/lines/1", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, table) = call(&app, Method::GET, "/api/v1/tiers/20/table", Some(&token), None).await;
    assert!(table["empty_state"].is_object());
    let (_, lines) = call(&app, Method::GET, "/api/v1/tiers/60/lines", Some(&token), None).await;
    assert_eq!(lines.as_array().unwrap().len(), 1);

    let (status, body) = call(&app, Method::GET, "/api/v1/tiers/80/lines", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");

    let (_, audit) = call(&app, Method::GET, "/api/v1/audit-log", Some(&token), None).await;
    let actions: Vec<&str> = audit.as_array().unwrap().iter().map(|e| e["action"].as_str().unwrap()).collect();
    assert!(actions.contains(&"admin_login"));
    assert!(actions.contains(&"delete"));
}

#[tokio::test]
async fn patch_changes_only_sent_columns() {
    let app = app();
    let token = operator_token(&app).await;
    call(
        &app,
        Method::POST,
        "/api/v1/tiers/60/lines",
        Some(&token),
        Some(json!({
            "customer_name": "Mona",
            "mobile_number": "01200000000",
            "payment_status": "paid",
            "monthly_price": 300,
            "renewal_date": "2030-01-01"
        })),
    )
    .await;

    let (status, body) = call(
        &app,
        Method::PATCH,
        "/api/v1/tiers/60/lines/1",
        Some(&token),
        Some(json!({ "renewal_status": "done", "customer_name": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["renewal_status"], "done");
    assert!(body["record"]["customer_name"].is_null());
    assert_eq!(body["record"]["payment_status"], "paid");
    assert_eq!(body["record"]["monthly_price"], 300.0);
    assert_eq!(body["record"]["renewal_date"], "2030-01-01");

    let (status, _) = call(&app, Method::PATCH, "/api/v1/tiers/60/lines/1", Some(&token), Some(json!({ "mobile_number": " " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(&app, Method::PATCH, "/api/v1/tiers/60/lines/7", Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = call(&app, Method::DELETE, "/api/v1/tiers/60/lines/7", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["notification"]["title"], "Error");
}

#[tokio::test]
async fn customers_reject_renewal_date() {
    let app = app();
    let token = operator_token(&app).await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/tiers/customers/lines",
        Some(&token),
        Some(json!({ "mobile_number": "0100", "renewal_date": "2025-01-01" })),
    )
    .await;
    // The form drops the column for this tier.
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["record"]["renewal_date"].is_null());
    assert_eq!(body["record"]["line_type"], "40");

    // A direct patch reaches the storage constraint instead.
    let (status, _) = call(
        &app,
        Method::PATCH,
        "/api/v1/tiers/40/lines/1",
        Some(&token),
        Some(json!({ "renewal_date": "2025-01-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn logout_revokes_operator_grant() {
    let app = app();
    let token = operator_token(&app).await;
    let (status, _) = call(&app, Method::POST, "/api/v1/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/api/v1/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.state.gate.active_grants(), 0);
}

#[tokio::test]
async fn dashboard_stream_is_event_stream() {
    let app = app();
    let token = operator_token(&app).await;
    let request = Request::builder()
        .uri("/api/v1/dashboard/stream")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));
    assert_eq!(app.state.feed.listener_count(), 3);

    drop(response);
    for _ in 0..100 {
        if app.state.feed.listener_count() == 0 {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("stream listeners leaked");
}

#[tokio::test]
async fn contact_link_is_public() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/contact", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().starts_with("https://wa.me/201559181558?text="));
}
