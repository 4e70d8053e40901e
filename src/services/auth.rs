use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    config::Config,
    db::tenant::schema_name,
    error::{ApiError, ApiResult},
    models::{
        auth::{Claims, RefreshClaims},
        user::{
            LoginResponse, RefreshToken, RegisterRequest, User, UserProfile, UserRole,
            USER_COLUMNS,
        },
    },
    services::metrics::LOGINS_COUNTER,
};

pub const BCRYPT_COST: u32 = 12;
pub const MIN_PASSWORD_LEN: usize = 8;

pub fn validate_email(email: &str) -> ApiResult<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::validation("Invalid email address")),
    }
}

pub fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Refresh tokens are long JWTs, past bcrypt's 72-byte input limit, so they
/// are stored as a SHA-256 digest.
fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub struct AuthService;

impl AuthService {
    pub async fn login(
        pool: &PgPool,
        config: &Config,
        tenant: &str,
        email: &str,
        password: &str,
    ) -> ApiResult<LoginResponse> {
        let schema = schema_name(tenant);

        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "{schema}".users WHERE email = $1 AND is_active = TRUE"#
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

        let valid = match &user {
            Some(u) => bcrypt::verify(password, &u.password_hash).unwrap_or(false),
            None => false,
        };
        let user = match user {
            Some(u) if valid => u,
            _ => {
                LOGINS_COUNTER.with_label_values(&[tenant, "failure"]).inc();
                return Err(ApiError::Unauthorized);
            }
        };

        LOGINS_COUNTER.with_label_values(&[tenant, "success"]).inc();
        Self::issue_session(pool, config, tenant, user).await
    }

    /// Client self-registration. Staff accounts are created by the owner.
    pub async fn register_client(
        pool: &PgPool,
        config: &Config,
        tenant: &str,
        req: &RegisterRequest,
    ) -> ApiResult<LoginResponse> {
        validate_email(&req.email)?;
        validate_password(&req.password)?;
        if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
            return Err(ApiError::validation("first_name and last_name are required"));
        }

        let schema = schema_name(tenant);
        let password_hash =
            bcrypt::hash(&req.password, BCRYPT_COST).map_err(|e| ApiError::Internal(e.into()))?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO "{schema}".users (email, password_hash, first_name, last_name, phone, role)
               VALUES ($1, $2, $3, $4, $5, 'client'::"{schema}".user_role)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(req.email.trim().to_lowercase())
        .bind(&password_hash)
        .bind(req.first_name.trim())
        .bind(req.last_name.trim())
        .bind(req.phone.as_deref().filter(|s| !s.trim().is_empty()))
        .fetch_one(pool)
        .await
        .map_err(|e| ApiError::from(e).on_conflict("An account with this email already exists"))?;

        Self::issue_session(pool, config, tenant, user).await
    }

    pub fn generate_access_token(
        user_id: Uuid,
        role: UserRole,
        tenant: &str,
        secret: &str,
        ttl_seconds: u64,
    ) -> anyhow::Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            tenant: tenant.to_string(),
            role,
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }

    fn generate_refresh_token(
        user_id: &Uuid,
        secret: &str,
        ttl_days: u64,
    ) -> anyhow::Result<(String, Uuid)> {
        let now = Utc::now().timestamp() as usize;
        let jti = Uuid::new_v4();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: jti.to_string(),
            iat: now,
            exp: now + (ttl_days * 86400) as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok((token, jti))
    }

    fn decode_refresh_token(token: &str, secret: &str) -> anyhow::Result<RefreshClaims> {
        let key = DecodingKey::from_secret(secret.as_bytes());
        let data = decode::<RefreshClaims>(token, &key, &Validation::new(Algorithm::HS256))?;
        Ok(data.claims)
    }

    /// Issue an access token plus a stored refresh token for `user`.
    async fn issue_session(
        pool: &PgPool,
        config: &Config,
        tenant: &str,
        user: User,
    ) -> ApiResult<LoginResponse> {
        let schema = schema_name(tenant);
        let role: UserRole = user.role.parse().unwrap_or(UserRole::Client);

        let access_token = Self::generate_access_token(
            user.id,
            role,
            tenant,
            &config.jwt_secret,
            config.jwt_expiry_seconds,
        )?;
        let (refresh_token, refresh_id) = Self::generate_refresh_token(
            &user.id,
            &config.jwt_refresh_secret,
            config.jwt_refresh_expiry_days,
        )?;

        let expires_at = Utc::now() + chrono::Duration::days(config.jwt_refresh_expiry_days as i64);
        sqlx::query(&format!(
            r#"INSERT INTO "{schema}".refresh_tokens (id, user_id, token_hash, expires_at)
               VALUES ($1, $2, $3, $4)"#
        ))
        .bind(refresh_id)
        .bind(user.id)
        .bind(hash_refresh_token(&refresh_token))
        .bind(expires_at)
        .execute(pool)
        .await?;

        let barbershop_name: Option<String> =
            sqlx::query_scalar("SELECT name FROM public.barbershops WHERE slug = $1")
                .bind(tenant)
                .fetch_optional(pool)
                .await?;

        Ok(LoginResponse {
            access_token,
            refresh_token,
            user: user.into(),
            barbershop_name: barbershop_name.unwrap_or_else(|| tenant.to_string()),
        })
    }

    /// Rotate refresh token: revoke old, issue new pair.
    pub async fn refresh(
        pool: &PgPool,
        config: &Config,
        tenant: &str,
        refresh_token: &str,
    ) -> ApiResult<LoginResponse> {
        let claims = Self::decode_refresh_token(refresh_token, &config.jwt_refresh_secret)
            .map_err(|_| ApiError::Unauthorized)?;
        let jti: Uuid = claims.jti.parse().map_err(|_| ApiError::Unauthorized)?;
        let user_id: Uuid = claims.sub.parse().map_err(|_| ApiError::Unauthorized)?;

        let schema = schema_name(tenant);

        let stored: RefreshToken = sqlx::query_as(&format!(
            r#"SELECT * FROM "{schema}".refresh_tokens WHERE id = $1 AND revoked = FALSE"#
        ))
        .bind(jti)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::Unauthorized)?;

        if stored.expires_at < Utc::now()
            || stored.user_id != user_id
            || stored.token_hash != hash_refresh_token(refresh_token)
        {
            return Err(ApiError::Unauthorized);
        }

        sqlx::query(&format!(
            r#"UPDATE "{schema}".refresh_tokens SET revoked = TRUE WHERE id = $1"#
        ))
        .bind(jti)
        .execute(pool)
        .await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "{schema}".users WHERE id = $1 AND is_active = TRUE"#
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::Unauthorized)?;

        Self::issue_session(pool, config, tenant, user).await
    }

    /// Revoke a refresh token. Unknown or malformed tokens are ignored.
    pub async fn logout(
        pool: &PgPool,
        config: &Config,
        tenant: &str,
        refresh_token: &str,
    ) -> ApiResult<()> {
        let Ok(claims) = Self::decode_refresh_token(refresh_token, &config.jwt_refresh_secret) else {
            return Ok(());
        };
        let Ok(jti) = claims.jti.parse::<Uuid>() else {
            return Ok(());
        };

        let schema = schema_name(tenant);
        sqlx::query(&format!(
            r#"UPDATE "{schema}".refresh_tokens SET revoked = TRUE WHERE id = $1"#
        ))
        .bind(jti)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_user(pool: &PgPool, tenant: &str, user_id: Uuid) -> ApiResult<User> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "{schema}".users WHERE id = $1"#
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("User"))
    }

    pub async fn me(pool: &PgPool, tenant: &str, user_id: Uuid) -> ApiResult<UserProfile> {
        Ok(Self::find_user(pool, tenant, user_id).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_access_token;

    #[test]
    fn access_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token =
            AuthService::generate_access_token(user_id, UserRole::Barber, "fade-club", "s3cret", 60)
                .unwrap();
        let user = decode_access_token(&token, "s3cret").unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.tenant, "fade-club");
        assert_eq!(user.role, UserRole::Barber);

        assert!(decode_access_token(&token, "other-secret").is_err());
    }

    #[test]
    fn refresh_token_carries_jti() {
        let user_id = Uuid::new_v4();
        let (token, jti) = AuthService::generate_refresh_token(&user_id, "r", 1).unwrap();
        let claims = AuthService::decode_refresh_token(&token, "r").unwrap();
        assert_eq!(claims.jti, jti.to_string());
        assert_eq!(claims.sub, user_id.to_string());
    }

    #[test]
    fn refresh_hash_is_stable_and_distinct() {
        assert_eq!(hash_refresh_token("abc"), hash_refresh_token("abc"));
        assert_ne!(hash_refresh_token("abc"), hash_refresh_token("abd"));
        assert_eq!(hash_refresh_token("abc").len(), 64);
    }

    #[test]
    fn email_and_password_rules() {
        assert!(validate_email("ana@fade.club").is_ok());
        assert!(validate_email("ana@localhost").is_err());
        assert!(validate_email("@fade.club").is_err());
        assert!(validate_email("no-at-sign").is_err());

        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }
}
