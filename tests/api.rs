//! Router behaviour that does not need a live database.

mod common;

use axum::{body::Body, http::StatusCode};
use barbershop_api::{config::DEFAULT_SUPER_ADMIN_KEY, models::user::UserRole};
use common::{
    app_with_config, body_json, offline_app, offline_pool, request, token, OFFLINE_DATABASE_URL,
    SUPER_ADMIN_KEY,
};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn missing_tenant_is_400() {
    let res = offline_app()
        .oneshot(request("GET", "/tenant/info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "Missing X-Tenant header");
}

#[tokio::test]
async fn malformed_tenant_is_400() {
    let res = offline_app()
        .oneshot(
            request("GET", "/tenant/info")
                .header("X-Tenant", "not a slug")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bookings_require_a_token() {
    let res = offline_app()
        .oneshot(
            request("GET", "/bookings")
                .header("X-Tenant", "fade-club")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["error"], "Missing Authorization header");
}

#[tokio::test]
async fn forged_token_is_401() {
    let res = offline_app()
        .oneshot(
            request("POST", "/bookings")
                .header("X-Tenant", "fade-club")
                .header("Authorization", "Bearer not.a.jwt")
                .header("Content-Type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_from_another_shop_is_403() {
    let res = offline_app()
        .oneshot(
            request("GET", "/bookings")
                .header("X-Tenant", "other-shop")
                .header("Authorization", format!("Bearer {}", token(UserRole::Owner, "fade-club")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn super_admin_key_is_checked() {
    let app = offline_app();

    let res = app
        .clone()
        .oneshot(request("GET", "/super-admin/barbershops").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .oneshot(
            request("GET", "/super-admin/barbershops")
                .header("X-Super-Admin-Key", format!("{SUPER_ADMIN_KEY}-wrong"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["error"], "Invalid super-admin key");
}

#[tokio::test]
async fn placeholder_super_admin_key_is_refused_in_production() {
    let mut config = common::config(OFFLINE_DATABASE_URL);
    config.app_env = "production".into();
    config.super_admin_key = DEFAULT_SUPER_ADMIN_KEY.into();
    assert!(config.validate().is_err());

    let res = app_with_config(offline_pool(), config)
        .oneshot(
            request("DELETE", "/super-admin/barbershops/fade-club")
                .header("X-Super-Admin-Key", DEFAULT_SUPER_ADMIN_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn metrics_are_exposed() {
    let res = offline_app()
        .oneshot(request("GET", "/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let content_type = res.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn health_reports_unreachable_database() {
    let res = offline_app()
        .oneshot(request("GET", "/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(res).await["status"], "error");
}

#[tokio::test]
async fn reserved_slug_is_unavailable_even_without_redis() {
    let res = offline_app()
        .oneshot(
            request("GET", "/signup/check-slug?slug=admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["available"], json!(false));
    assert_eq!(body["reason"], "This identifier is reserved.");
}
