use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::Rejection,
    middleware::{rate_limit::check_rate_limit, tenant::TenantSlug},
    models::{
        auth::AuthenticatedUser,
        user::{LoginRequest, RefreshTokenRequest, RegisterRequest},
    },
    routes::{any_role, authorize, signup::real_ip},
    services::auth::AuthService,
    AppState,
};

/// Client self-registration; returns a session right away.
pub async fn register(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), Rejection> {
    let rate_key = format!("rate:register:{tenant}:{}", real_ip(&headers));
    check_rate_limit(&state.redis, &rate_key, 10, 3600).await?;

    let session = AuthService::register_client(&state.db, &state.config, &tenant, &body)
        .await
        .map_err(|e| state.reject(e))?;
    Ok((StatusCode::CREATED, Json(json!(session))))
}

pub async fn login(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, Rejection> {
    // 5 attempts per 15 min per email+tenant
    let rate_key = format!("rate:login:{}:{}", tenant, body.email.trim().to_lowercase());
    check_rate_limit(&state.redis, &rate_key, 5, 900).await?;

    AuthService::login(&state.db, &state.config, &tenant, &body.email, &body.password)
        .await
        .map(|session| Json(json!(session)))
        .map_err(|e| state.reject(e))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<Value>, Rejection> {
    AuthService::refresh(&state.db, &state.config, &tenant, &body.refresh_token)
        .await
        .map(|session| Json(json!(session)))
        .map_err(|e| state.reject(e))
}

pub async fn logout(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<StatusCode, Rejection> {
    AuthService::logout(&state.db, &state.config, &tenant, &body.refresh_token)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
) -> Result<Json<Value>, Rejection> {
    authorize(&user, &tenant, any_role)?;
    AuthService::me(&state.db, &tenant, user.user_id)
        .await
        .map(|profile| Json(json!(profile)))
        .map_err(|e| state.reject(e))
}
