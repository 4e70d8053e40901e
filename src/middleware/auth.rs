use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::{
    error::{reject, Rejection},
    middleware::tenant::extract_slug,
    models::{
        auth::{AuthenticatedUser, Claims},
        user::UserRole,
    },
};

/// Access-token secret, installed on the router as an extension.
#[derive(Clone)]
pub struct JwtSecret(pub String);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;

        let secret = parts.extensions.get::<JwtSecret>().ok_or_else(|| {
            tracing::error!("JwtSecret extension missing from router");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        })?;

        let user = decode_access_token(token, &secret.0)
            .map_err(|_| reject(StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;

        ensure_same_shop(&user, parts)?;
        Ok(user)
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, Rejection> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Missing Authorization header"))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Invalid Authorization header format"))
}

/// Shop tokens only work against the shop they were issued for, whether the
/// request names it by header or by subdomain.
fn ensure_same_shop(user: &AuthenticatedUser, parts: &Parts) -> Result<(), Rejection> {
    if user.role == UserRole::SuperAdmin {
        return Ok(());
    }
    match extract_slug(parts) {
        Ok(slug) if slug != user.tenant => Err(reject(StatusCode::FORBIDDEN, "Tenant mismatch")),
        // unresolvable tenants are reported by the TenantSlug extractor
        _ => Ok(()),
    }
}

pub fn decode_access_token(token: &str, secret: &str) -> anyhow::Result<AuthenticatedUser> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let claims = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?
        .claims;

    Ok(AuthenticatedUser {
        user_id: claims.sub.parse()?,
        tenant: claims.tenant,
        role: claims.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::Request, Json};
    use uuid::Uuid;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/bookings");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn user(role: UserRole, tenant: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            tenant: tenant.into(),
            role,
        }
    }

    #[test]
    fn bearer_prefix_is_required() {
        let parts = parts_with(&[("Authorization", "Bearer abc.def.ghi")]);
        assert_eq!(bearer_token(&parts.headers).unwrap(), "abc.def.ghi");

        let parts = parts_with(&[("Authorization", "Basic dXNlcjpwYXNz")]);
        let (status, Json(body)) = bearer_token(&parts.headers).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid Authorization header format");

        let parts = parts_with(&[("Authorization", "Bearer   ")]);
        assert!(bearer_token(&parts.headers).is_err());

        let parts = parts_with(&[]);
        let (_, Json(body)) = bearer_token(&parts.headers).unwrap_err();
        assert_eq!(body["error"], "Missing Authorization header");
    }

    #[test]
    fn token_is_bound_to_header_shop() {
        let owner = user(UserRole::Owner, "fade-club");
        assert!(ensure_same_shop(&owner, &parts_with(&[("X-Tenant", "Fade-Club")])).is_ok());

        let (status, _) =
            ensure_same_shop(&owner, &parts_with(&[("X-Tenant", "other-shop")])).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn token_is_bound_to_subdomain_shop() {
        let owner = user(UserRole::Owner, "fade-club");
        let parts = parts_with(&[("Host", "other-shop.barbers.example")]);
        assert!(ensure_same_shop(&owner, &parts).is_err());
    }

    #[test]
    fn super_admin_crosses_shops() {
        let admin = user(UserRole::SuperAdmin, "");
        assert!(ensure_same_shop(&admin, &parts_with(&[("X-Tenant", "other-shop")])).is_ok());
    }
}
