use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::{
    config::Config,
    db::tenant::{drop_tenant_schema, provision_tenant_schema, schema_name},
    error::{ApiError, ApiResult},
    middleware::tenant::is_valid_slug,
    models::{
        tenant::{
            Barbershop, CreateBarbershopRequest, PlanType, SignupRequest, UpdateBarbershopRequest,
        },
        user::{User, USER_COLUMNS},
    },
    services::auth::{validate_email, validate_password, BCRYPT_COST},
};

pub const RESERVED_SLUGS: &[&str] = &[
    "www", "api", "demo", "super-admin", "app", "admin", "login", "signup",
    "register", "support", "billing", "status", "about", "contact", "docs",
];

const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Slug rules for new barbershops: 3 to 32 characters of `[a-z0-9-]`,
/// no leading or trailing hyphen.
pub fn is_valid_signup_slug(s: &str) -> bool {
    (3..=32).contains(&s.len())
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

/// Why `slug` cannot be registered, if it cannot.
pub fn slug_problem(slug: &str) -> Option<&'static str> {
    if !is_valid_signup_slug(slug) {
        Some("The identifier must be 3 to 32 lowercase letters, digits or hyphens, not starting or ending with a hyphen.")
    } else if RESERVED_SLUGS.contains(&slug) {
        Some("This identifier is reserved.")
    } else {
        None
    }
}

fn validate_offset(minutes: i32) -> ApiResult<()> {
    if (-MAX_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(ApiError::validation(
            "timezone_offset_minutes must be between -840 and 840",
        ))
    }
}

fn taken(e: sqlx::Error) -> ApiError {
    ApiError::from(e).on_conflict("This identifier is already taken")
}

pub struct TenantService;

impl TenantService {
    pub async fn slug_exists(pool: &PgPool, slug: &str) -> ApiResult<bool> {
        let exists = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM public.barbershops WHERE slug = $1)")
            .bind(slug)
            .fetch_one(pool)
            .await?;
        Ok(exists)
    }

    pub async fn get(pool: &PgPool, slug: &str) -> ApiResult<Barbershop> {
        sqlx::query_as::<_, Barbershop>("SELECT * FROM public.barbershops WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await?
            .ok_or(ApiError::NotFound("Barbershop"))
    }

    pub async fn list(pool: &PgPool) -> ApiResult<Vec<Barbershop>> {
        let shops = sqlx::query_as::<_, Barbershop>("SELECT * FROM public.barbershops ORDER BY name")
            .fetch_all(pool)
            .await?;
        Ok(shops)
    }

    /// Registers the barbershop and provisions its schema. If provisioning
    /// fails the registry row is removed again.
    pub async fn create(pool: &PgPool, req: &CreateBarbershopRequest) -> ApiResult<Barbershop> {
        let slug = req.slug.trim().to_lowercase();
        if let Some(problem) = slug_problem(&slug) {
            return Err(ApiError::validation(problem));
        }
        if req.name.trim().is_empty() {
            return Err(ApiError::validation("name is required"));
        }
        let offset = req.timezone_offset_minutes.unwrap_or(0);
        validate_offset(offset)?;

        let shop = sqlx::query_as::<_, Barbershop>(
            "INSERT INTO public.barbershops (slug, name, address, phone, email, timezone_offset_minutes, plan)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(&slug)
        .bind(req.name.trim())
        .bind(&req.address)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(offset)
        .bind(req.plan.unwrap_or(PlanType::Free))
        .fetch_one(pool)
        .await
        .map_err(taken)?;

        Self::provision_or_rollback(pool, &slug).await?;
        Ok(shop)
    }

    async fn provision_or_rollback(pool: &PgPool, slug: &str) -> ApiResult<()> {
        if let Err(e) = provision_tenant_schema(pool, slug).await {
            tracing::error!("Schema provisioning failed for '{slug}': {e}");
            Self::remove(pool, slug).await?;
            return Err(ApiError::Internal(e.context("Schema provisioning failed")));
        }
        Ok(())
    }

    /// Self-service onboarding: barbershop with a trial, its schema and the
    /// owner account.
    pub async fn signup(
        pool: &PgPool,
        config: &Config,
        req: &SignupRequest,
    ) -> ApiResult<(Barbershop, User)> {
        let slug = req.slug.trim().to_lowercase();
        if let Some(problem) = slug_problem(&slug) {
            return Err(ApiError::validation(problem));
        }
        if req.name.trim().is_empty() {
            return Err(ApiError::validation("The barbershop name is required"));
        }
        if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
            return Err(ApiError::validation("first_name and last_name are required"));
        }
        validate_email(&req.email)?;
        validate_password(&req.password)?;
        let offset = req.timezone_offset_minutes.unwrap_or(0);
        validate_offset(offset)?;

        let email = req.email.trim().to_lowercase();
        let trial_expires_at = Utc::now() + Duration::days(config.trial_days);

        let shop = sqlx::query_as::<_, Barbershop>(
            "INSERT INTO public.barbershops
               (slug, name, phone, address, email, timezone_offset_minutes, plan, trial_expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'free', $7)
             RETURNING *",
        )
        .bind(&slug)
        .bind(req.name.trim())
        .bind(req.phone.as_deref().filter(|s| !s.trim().is_empty()))
        .bind(req.address.as_deref().filter(|s| !s.trim().is_empty()))
        .bind(&email)
        .bind(offset)
        .bind(trial_expires_at)
        .fetch_one(pool)
        .await
        .map_err(taken)?;

        Self::provision_or_rollback(pool, &slug).await?;

        let password_hash =
            bcrypt::hash(&req.password, BCRYPT_COST).map_err(|e| ApiError::Internal(e.into()))?;
        let schema = schema_name(&slug);
        let owner = sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO "{schema}".users (email, password_hash, first_name, last_name, phone, role)
               VALUES ($1, $2, $3, $4, $5, 'owner'::"{schema}".user_role)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(&email)
        .bind(&password_hash)
        .bind(req.first_name.trim())
        .bind(req.last_name.trim())
        .bind(req.phone.as_deref().filter(|s| !s.trim().is_empty()))
        .fetch_one(pool)
        .await;

        match owner {
            Ok(owner) => Ok((shop, owner)),
            Err(e) => {
                Self::remove(pool, &slug).await?;
                Err(e.into())
            }
        }
    }

    pub async fn update(
        pool: &PgPool,
        slug: &str,
        req: &UpdateBarbershopRequest,
    ) -> ApiResult<Barbershop> {
        if !is_valid_slug(slug) {
            return Err(ApiError::NotFound("Barbershop"));
        }
        if let Some(offset) = req.timezone_offset_minutes {
            validate_offset(offset)?;
        }
        if matches!(&req.name, Some(name) if name.trim().is_empty()) {
            return Err(ApiError::validation("name cannot be empty"));
        }

        sqlx::query_as::<_, Barbershop>(
            "UPDATE public.barbershops SET
               name    = COALESCE($2, name),
               address = COALESCE($3, address),
               phone   = COALESCE($4, phone),
               email   = COALESCE($5, email),
               timezone_offset_minutes = COALESCE($6, timezone_offset_minutes),
               plan    = COALESCE($7, plan),
               is_active = COALESCE($8, is_active),
               trial_expires_at = CASE
                   WHEN $9 = TRUE THEN NULL::TIMESTAMPTZ
                   ELSE COALESCE($10, trial_expires_at)
               END,
               updated_at = NOW()
             WHERE slug = $1
             RETURNING *",
        )
        .bind(slug)
        .bind(req.name.as_deref().map(str::trim))
        .bind(&req.address)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(req.timezone_offset_minutes)
        .bind(req.plan)
        .bind(req.is_active)
        .bind(req.clear_trial.unwrap_or(false))
        .bind(req.trial_expires_at)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("Barbershop"))
    }

    /// Drops the tenant schema and the registry row.
    pub async fn remove(pool: &PgPool, slug: &str) -> ApiResult<()> {
        if !is_valid_slug(slug) {
            return Err(ApiError::NotFound("Barbershop"));
        }
        drop_tenant_schema(pool, slug).await?;
        let deleted = sqlx::query("DELETE FROM public.barbershops WHERE slug = $1")
            .bind(slug)
            .execute(pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(ApiError::NotFound("Barbershop"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_slug_rules() {
        assert!(is_valid_signup_slug("fade-club"));
        assert!(is_valid_signup_slug("b42"));
        assert!(!is_valid_signup_slug("ab"));
        assert!(!is_valid_signup_slug(&"a".repeat(33)));
        assert!(!is_valid_signup_slug("-fade"));
        assert!(!is_valid_signup_slug("Fade"));
    }

    #[test]
    fn reserved_slugs_are_refused() {
        assert_eq!(slug_problem("admin"), Some("This identifier is reserved."));
        assert!(slug_problem("x").is_some());
        assert_eq!(slug_problem("fade-club"), None);
    }

    #[test]
    fn offsets_stay_within_real_timezones() {
        assert!(validate_offset(-300).is_ok());
        assert!(validate_offset(840).is_ok());
        assert!(validate_offset(841).is_err());
    }
}
