use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::AppState;

/// Validates that a slug only contains lowercase ASCII letters, digits and hyphens,
/// does not start or end with a hyphen, and is between 2 and 63 characters.
/// The slug ends up in `format!()`-built schema names, so this is what keeps
/// those queries injection-free.
pub fn is_valid_slug(s: &str) -> bool {
    let len = s.len();
    (2..=63).contains(&len)
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

/// Extracts the tenant slug from the `X-Tenant` header or first subdomain,
/// then validates the barbershop is active and its trial has not expired.
#[derive(Debug, Clone)]
pub struct TenantSlug(pub String);

impl FromRequestParts<AppState> for TenantSlug {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let slug = extract_slug(parts)?;

        let row: Option<(bool, Option<chrono::DateTime<Utc>>)> = sqlx::query_as(
            "SELECT is_active, trial_expires_at FROM public.barbershops WHERE slug = $1",
        )
        .bind(&slug)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("tenant lookup failed for '{slug}': {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Database error" })))
        })?;

        match row {
            None => Err((StatusCode::NOT_FOUND, Json(json!({ "error": "Barbershop not found" })))),
            Some((false, _)) => Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Account is inactive" })))),
            Some((true, Some(expires_at))) if expires_at < Utc::now() => Err((
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({
                    "error": "The trial period has ended. Please contact support.",
                    "code": "trial_expired"
                })),
            )),
            Some(_) => Ok(TenantSlug(slug)),
        }
    }
}

pub(crate) fn extract_slug(parts: &Parts) -> Result<String, (StatusCode, Json<Value>)> {
    // 1. X-Tenant header
    if let Some(tenant) = parts
        .headers
        .get("X-Tenant")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
    {
        if !is_valid_slug(&tenant) {
            return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid tenant identifier" }))));
        }
        return Ok(tenant);
    }

    // 2. Subdomain from Host header
    if let Some(host) = parts.headers.get("Host").and_then(|v| v.to_str().ok()) {
        let domain = host.split(':').next().unwrap_or(host);
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() >= 3 {
            let subdomain = labels[0].to_lowercase();
            if subdomain != "www" && subdomain != "api" {
                if !is_valid_slug(&subdomain) {
                    return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid tenant identifier" }))));
                }
                return Ok(subdomain);
            }
        }
    }

    Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Missing X-Tenant header" }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/bookings");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("fade-club"));
        assert!(is_valid_slug("b2"));
        assert!(!is_valid_slug("a"));
        assert!(!is_valid_slug("-fade"));
        assert!(!is_valid_slug("fade-"));
        assert!(!is_valid_slug("Fade"));
        assert!(!is_valid_slug("fade_club"));
        assert!(!is_valid_slug("x\"; DROP SCHEMA"));
    }

    #[test]
    fn header_wins_over_host() {
        let parts = parts_with(&[("X-Tenant", "Fade-Club"), ("Host", "other.barbers.example")]);
        assert_eq!(extract_slug(&parts).unwrap(), "fade-club");
    }

    #[test]
    fn subdomain_is_used_without_header() {
        let parts = parts_with(&[("Host", "fade-club.barbers.example:8080")]);
        assert_eq!(extract_slug(&parts).unwrap(), "fade-club");
    }

    #[test]
    fn api_subdomain_is_not_a_tenant() {
        let parts = parts_with(&[("Host", "api.barbers.example")]);
        let (status, _) = extract_slug(&parts).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_header_is_rejected() {
        let parts = parts_with(&[("X-Tenant", "bad_slug!")]);
        let (status, Json(body)) = extract_slug(&parts).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid tenant identifier");
    }
}
