//! HTTP surface tests: routing, status codes and response shapes.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Duration;
use common::{ADMIN_EMAIL, ADMIN_PASSWORD, get, post_json, send, spawn_app};
use serde_json::json;

async fn login_token(app: &common::TestApp, password: &str) -> String {
    let response = send(
        &app.router,
        post_json(
            "/api/auth/login",
            &json!({"username": "admin", "password": password}),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    response.json()["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = spawn_app().await;

    let response = send(&app.router, get("/api/health", None)).await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["database"], "SQLite");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn login_returns_token_and_user() {
    let app = spawn_app().await;

    let response = send(
        &app.router,
        post_json(
            "/api/auth/login",
            &json!({"username": "admin", "password": ADMIN_PASSWORD}),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let content_type = response.headers[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with(mime::APPLICATION_JSON.as_ref()));

    let body = response.json();
    assert_eq!(body["success"], true);
    assert!(body["token"].as_str().is_some_and(|t| t.split('.').count() == 3));
    assert_eq!(body["user"]["username"], "admin");
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["user"]["id"].is_number());
}

#[tokio::test]
async fn login_with_bad_credentials_is_unauthorized() {
    let app = spawn_app().await;

    for (username, password) in [("admin", "wrong-password"), ("ghost", ADMIN_PASSWORD)] {
        let response = send(
            &app.router,
            post_json(
                "/api/auth/login",
                &json!({"username": username, "password": password}),
            ),
        )
        .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.json(),
            json!({"success": false, "error": "Invalid username or password"})
        );
    }
}

#[tokio::test]
async fn login_validation_lists_fields() {
    let app = spawn_app().await;

    let response = send(
        &app.router,
        post_json("/api/auth/login", &json!({"username": "   ", "password": ""})),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let body = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Validation failed");
    let fields: Vec<_> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, ["username", "password"]);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = spawn_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = send(&app.router, request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["success"], false);
}

#[tokio::test]
async fn forgot_password_dispatches_code() {
    let app = spawn_app().await;

    let response = send(
        &app.router,
        post_json("/api/auth/forgot-password", &json!({"email": ADMIN_EMAIL})),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({"success": true, "message": "OTP has been sent to your email address"})
    );
    assert_eq!(app.notifier.codes().len(), 1);
}

#[tokio::test]
async fn forgot_password_unknown_email_is_bad_request() {
    let app = spawn_app().await;

    let response = send(
        &app.router,
        post_json(
            "/api/auth/forgot-password",
            &json!({"email": "nobody@example.com"}),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json()["error"],
        "No account found with this email address"
    );
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn forgot_password_rejects_malformed_email() {
    let app = spawn_app().await;

    let response = send(
        &app.router,
        post_json("/api/auth/forgot-password", &json!({"email": "not-an-email"})),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["details"][0]["field"], "email");
}

#[tokio::test]
async fn forgot_password_delivery_failure_is_server_error() {
    let app = spawn_app().await;
    app.notifier.fail_codes(true);

    let response = send(
        &app.router,
        post_json("/api/auth/forgot-password", &json!({"email": ADMIN_EMAIL})),
    )
    .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json(),
        json!({"success": false, "error": "Failed to send email. Please try again later."})
    );
}

#[tokio::test]
async fn reset_password_over_http() {
    let app = spawn_app().await;

    send(
        &app.router,
        post_json("/api/auth/forgot-password", &json!({"email": ADMIN_EMAIL})),
    )
    .await;
    let otp = app.notifier.last_code();

    let response = send(
        &app.router,
        post_json(
            "/api/auth/reset-password",
            &json!({"email": ADMIN_EMAIL, "otp": otp.as_str(), "newPassword": "fresh-pass"}),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({"success": true, "message": "Password has been reset successfully"})
    );

    login_token(&app, "fresh-pass").await;

    let reused = send(
        &app.router,
        post_json(
            "/api/auth/reset-password",
            &json!({"email": ADMIN_EMAIL, "otp": otp.as_str(), "newPassword": "other-pass"}),
        ),
    )
    .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
    assert_eq!(reused.json()["error"], "Invalid or expired OTP");
}

#[tokio::test]
async fn reset_password_hides_unknown_email() {
    let app = spawn_app().await;

    let response = send(
        &app.router,
        post_json(
            "/api/auth/reset-password",
            &json!({"email": "nobody@example.com", "otp": "123456", "newPassword": "fresh-pass"}),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json(),
        json!({"success": false, "error": "Invalid or expired OTP"})
    );
}

#[tokio::test]
async fn reset_password_validation() {
    let app = spawn_app().await;

    let response = send(
        &app.router,
        post_json(
            "/api/auth/reset-password",
            &json!({"email": ADMIN_EMAIL, "otp": "12345", "newPassword": "short"}),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let body = response.json();
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["details"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn verify_only_checks_presence() {
    let app = spawn_app().await;

    let missing = send(
        &app.router,
        Request::builder()
            .method("POST")
            .uri("/api/auth/verify")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let present = send(
        &app.router,
        Request::builder()
            .method("POST")
            .uri("/api/auth/verify")
            .header(header::AUTHORIZATION, "Bearer anything")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(present.status, StatusCode::OK);
    assert_eq!(present.json()["success"], true);
}

#[tokio::test]
async fn me_requires_a_valid_session() {
    let app = spawn_app().await;

    let anonymous = send(&app.router, get("/api/auth/me", None)).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.json()["success"], false);

    let forged = send(&app.router, get("/api/auth/me", Some("a.b.c"))).await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

    let token = login_token(&app, ADMIN_PASSWORD).await;
    let response = send(&app.router, get("/api/auth/me", Some(&token))).await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert_eq!(body["user"]["username"], "admin");
    assert_eq!(body["user"]["email"], ADMIN_EMAIL);
}

#[tokio::test]
async fn session_expires_after_lifetime() {
    let app = spawn_app().await;
    let token = login_token(&app, ADMIN_PASSWORD).await;

    app.clock.advance(Duration::hours(23));
    let still_valid = send(&app.router, get("/api/auth/me", Some(&token))).await;
    assert_eq!(still_valid.status, StatusCode::OK);

    app.clock.advance(Duration::hours(2));
    let expired = send(&app.router, get("/api/auth/me", Some(&token))).await;
    assert_eq!(expired.status, StatusCode::UNAUTHORIZED);
    assert_eq!(expired.json()["error"], "Invalid or expired token");
}

#[tokio::test]
async fn metrics_are_protected() {
    let app = spawn_app().await;

    let anonymous = send(&app.router, get("/api/metrics", None)).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let token = login_token(&app, ADMIN_PASSWORD).await;
    let response = send(&app.router, get("/api/metrics", Some(&token))).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let app = spawn_app().await;

    let response = send(&app.router, get("/api/does-not-exist", None)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let body = response.json();
    assert_eq!(body["error"], "Not Found");
    assert!(body["message"].as_str().unwrap().contains("/api/does-not-exist"));
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = spawn_app().await;

    let response = send(&app.router, get("/api/health", None)).await;
    assert_eq!(response.headers["x-content-type-options"], "nosniff");
    assert_eq!(response.headers["x-frame-options"], "DENY");
    assert!(response.headers.contains_key("strict-transport-security"));
    assert!(response.headers.contains_key("x-request-id"));
}
