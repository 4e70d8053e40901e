use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    error::{ApiError, ApiResult},
    models::barber::{Barber, CreateBarberRequest, UpdateBarberRequest},
    services::auth::{validate_email, validate_password, BCRYPT_COST},
};

pub struct BarberService;

impl BarberService {
    pub async fn list(pool: &PgPool, tenant: &str, include_inactive: bool) -> ApiResult<Vec<Barber>> {
        let schema = schema_name(tenant);
        let barbers = sqlx::query_as::<_, Barber>(&format!(
            r#"SELECT * FROM "{schema}".barbers
               WHERE is_active OR $1
               ORDER BY display_name"#
        ))
        .bind(include_inactive)
        .fetch_all(pool)
        .await?;
        Ok(barbers)
    }

    pub async fn get(pool: &PgPool, tenant: &str, id: Uuid) -> ApiResult<Barber> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, Barber>(&format!(r#"SELECT * FROM "{schema}".barbers WHERE id = $1"#))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(ApiError::NotFound("Barber"))
    }

    /// The barber row linked to a staff login, if any.
    pub async fn find_by_user(pool: &PgPool, tenant: &str, user_id: Uuid) -> ApiResult<Option<Barber>> {
        let schema = schema_name(tenant);
        let barber = sqlx::query_as::<_, Barber>(&format!(
            r#"SELECT * FROM "{schema}".barbers WHERE user_id = $1"#
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(barber)
    }

    /// Creates the barber and, when requested, a `barber` login linked to it.
    pub async fn create(pool: &PgPool, tenant: &str, req: &CreateBarberRequest) -> ApiResult<Barber> {
        let display_name = req.display_name.trim();
        if display_name.is_empty() {
            return Err(ApiError::validation("display_name is required"));
        }

        let schema = schema_name(tenant);
        let mut tx = pool.begin().await?;

        let user_id: Option<Uuid> = match &req.account {
            Some(account) => {
                validate_email(&account.email)?;
                validate_password(&account.password)?;
                if account.first_name.trim().is_empty() || account.last_name.trim().is_empty() {
                    return Err(ApiError::validation("first_name and last_name are required"));
                }
                let hash = bcrypt::hash(&account.password, BCRYPT_COST)
                    .map_err(|e| ApiError::Internal(e.into()))?;
                let id: Uuid = sqlx::query_scalar(&format!(
                    r#"INSERT INTO "{schema}".users (email, password_hash, first_name, last_name, phone, role)
                       VALUES ($1, $2, $3, $4, $5, 'barber'::"{schema}".user_role)
                       RETURNING id"#
                ))
                .bind(account.email.trim().to_lowercase())
                .bind(hash)
                .bind(account.first_name.trim())
                .bind(account.last_name.trim())
                .bind(account.phone.as_deref())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    ApiError::from(e).on_conflict("An account with this email already exists")
                })?;
                Some(id)
            }
            None => None,
        };

        let barber = sqlx::query_as::<_, Barber>(&format!(
            r#"INSERT INTO "{schema}".barbers (user_id, display_name, bio)
               VALUES ($1, $2, $3)
               RETURNING *"#
        ))
        .bind(user_id)
        .bind(display_name)
        .bind(&req.bio)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(barber)
    }

    pub async fn update(
        pool: &PgPool,
        tenant: &str,
        id: Uuid,
        req: &UpdateBarberRequest,
    ) -> ApiResult<Barber> {
        if matches!(&req.display_name, Some(name) if name.trim().is_empty()) {
            return Err(ApiError::validation("display_name cannot be empty"));
        }
        let schema = schema_name(tenant);
        sqlx::query_as::<_, Barber>(&format!(
            r#"UPDATE "{schema}".barbers
               SET display_name = COALESCE($1, display_name),
                   bio = COALESCE($2, bio),
                   is_active = COALESCE($3, is_active)
               WHERE id = $4
               RETURNING *"#
        ))
        .bind(req.display_name.as_deref().map(str::trim))
        .bind(&req.bio)
        .bind(req.is_active)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("Barber"))
    }

    /// Soft delete: existing bookings keep pointing at the barber row.
    pub async fn deactivate(pool: &PgPool, tenant: &str, id: Uuid) -> ApiResult<()> {
        let schema = schema_name(tenant);
        let result = sqlx::query(&format!(
            r#"UPDATE "{schema}".barbers SET is_active = FALSE WHERE id = $1"#
        ))
        .bind(id)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Barber"));
        }
        Ok(())
    }
}
