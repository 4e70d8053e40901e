use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::Rejection,
    middleware::rate_limit::check_rate_limit,
    models::tenant::SignupRequest,
    services::tenants::{slug_problem, TenantService},
    AppState,
};

/// Real client IP behind the reverse proxy: X-Real-IP, then the first
/// X-Forwarded-For entry.
pub(crate) fn real_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return ip.to_string();
    }
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            return first.trim().to_string();
        }
    }
    "unknown".to_string()
}

#[derive(Deserialize)]
pub struct CheckSlugQuery {
    pub slug: String,
}

pub async fn check_slug(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CheckSlugQuery>,
) -> Result<Json<Value>, Rejection> {
    let ip = real_ip(&headers);
    check_rate_limit(&state.redis, &format!("rate:check-slug:ip:{ip}"), 30, 60).await?;

    let slug = params.slug.trim().to_lowercase();
    if let Some(reason) = slug_problem(&slug) {
        return Ok(Json(json!({ "available": false, "reason": reason })));
    }

    let exists = TenantService::slug_exists(&state.db, &slug)
        .await
        .map_err(|e| state.reject(e))?;

    if exists {
        Ok(Json(json!({ "available": false, "reason": "This identifier is already taken." })))
    } else {
        Ok(Json(json!({ "available": true })))
    }
}

pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Value>), Rejection> {
    let ip = real_ip(&headers);
    // 5 signups/hour per IP, 20/hour overall
    check_rate_limit(&state.redis, &format!("rate:signup:ip:{ip}"), 5, 3600).await?;
    check_rate_limit(&state.redis, "rate:signup:global", 20, 3600).await?;

    let (shop, owner) = TenantService::signup(&state.db, &state.config, &body)
        .await
        .map_err(|e| state.reject(e))?;

    let login_url = state.config.tenant_url(&shop.slug, "/login");
    tracing::info!("New barbershop signed up: {}", shop.slug);

    if let Some(email_svc) = state.email.clone() {
        let expires = shop
            .trial_expires_at
            .map(|t| t.format("%d %B %Y").to_string())
            .unwrap_or_default();
        let to_email = owner.email.clone();
        let to_name = owner.full_name();
        let shop_name = shop.name.clone();
        let url = login_url.clone();
        tokio::spawn(async move {
            if let Err(e) = email_svc
                .send_welcome_email(&to_email, &to_name, &shop_name, &url, &expires)
                .await
            {
                tracing::warn!("signup welcome email failed for '{shop_name}': {e}");
            }
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "slug": shop.slug,
            "name": shop.name,
            "trial_expires_at": shop.trial_expires_at,
            "login_url": login_url,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_ip_prefers_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        assert_eq!(real_ip(&headers), "10.0.0.1");
        headers.insert("x-real-ip", "203.0.113.7".parse().unwrap());
        assert_eq!(real_ip(&headers), "203.0.113.7");
        assert_eq!(real_ip(&HeaderMap::new()), "unknown");
    }
}
