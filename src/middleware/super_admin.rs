use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{
    config::Config,
    error::{reject, Rejection},
    AppState,
};

pub const SUPER_ADMIN_HEADER: &str = "X-Super-Admin-Key";

/// Platform operator access to `/super-admin/*`. These routes create and
/// drop whole barbershops, so the key is compared in constant time and the
/// routes stay closed while no real key is configured.
pub struct SuperAdminAuth;

impl FromRequestParts<AppState> for SuperAdminAuth {
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(SUPER_ADMIN_HEADER)
            .and_then(|v| v.to_str().ok());

        check_key(&state.config, provided).inspect_err(|(status, _)| {
            if *status == StatusCode::UNAUTHORIZED {
                tracing::warn!("super-admin request rejected on {}", parts.uri.path());
            }
        })?;
        Ok(SuperAdminAuth)
    }
}

fn check_key(config: &Config, provided: Option<&str>) -> Result<(), Rejection> {
    if !config.super_admin_key_is_set() {
        return Err(reject(StatusCode::FORBIDDEN, "Super-admin access is disabled"));
    }
    let provided = provided
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Missing X-Super-Admin-Key header"))?;
    if !keys_match(provided, &config.super_admin_key) {
        return Err(reject(StatusCode::UNAUTHORIZED, "Invalid super-admin key"));
    }
    Ok(())
}

/// Digests first so neither the content nor the length of the configured
/// key shows up in response timing.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided.as_slice().ct_eq(expected.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{test_config, DEFAULT_SUPER_ADMIN_KEY};

    #[test]
    fn key_comparison() {
        assert!(keys_match("super", "super"));
        assert!(!keys_match("super ", "super"));
        assert!(!keys_match("supe", "super"));
        assert!(!keys_match("", "super"));
    }

    #[test]
    fn missing_or_wrong_key_is_401() {
        let config = test_config();
        assert!(check_key(&config, Some("super")).is_ok());

        let (status, axum::Json(body)) = check_key(&config, None).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing X-Super-Admin-Key header");

        let (status, _) = check_key(&config, Some("guess")).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn placeholder_key_closes_routes_in_production() {
        let mut config = test_config();
        config.super_admin_key = DEFAULT_SUPER_ADMIN_KEY.into();
        assert!(check_key(&config, Some(DEFAULT_SUPER_ADMIN_KEY)).is_ok());

        config.app_env = "production".into();
        let (status, _) = check_key(&config, Some(DEFAULT_SUPER_ADMIN_KEY)).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn empty_key_never_matches() {
        let mut config = test_config();
        config.super_admin_key = String::new();
        let (status, _) = check_key(&config, Some("")).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
