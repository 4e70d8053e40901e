use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    error::{ApiError, ApiResult},
    models::service::{
        validate_duration, validate_price, CreateServiceRequest, Service, UpdateServiceRequest,
    },
};

/// The shop's service menu.
pub struct CatalogService;

impl CatalogService {
    pub async fn list(pool: &PgPool, tenant: &str, include_inactive: bool) -> ApiResult<Vec<Service>> {
        let schema = schema_name(tenant);
        let services = sqlx::query_as::<_, Service>(&format!(
            r#"SELECT * FROM "{schema}".services
               WHERE is_active OR $1
               ORDER BY name"#
        ))
        .bind(include_inactive)
        .fetch_all(pool)
        .await?;
        Ok(services)
    }

    pub async fn get(pool: &PgPool, tenant: &str, id: Uuid) -> ApiResult<Service> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, Service>(&format!(r#"SELECT * FROM "{schema}".services WHERE id = $1"#))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(ApiError::NotFound("Service"))
    }

    pub async fn create(pool: &PgPool, tenant: &str, req: &CreateServiceRequest) -> ApiResult<Service> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(ApiError::validation("name is required"));
        }
        validate_duration(req.duration_minutes).map_err(ApiError::Validation)?;
        let price = req.price_cents.unwrap_or(0);
        validate_price(price).map_err(ApiError::Validation)?;

        let schema = schema_name(tenant);
        sqlx::query_as::<_, Service>(&format!(
            r#"INSERT INTO "{schema}".services (name, description, duration_minutes, price_cents)
               VALUES ($1, $2, $3, $4)
               RETURNING *"#
        ))
        .bind(name)
        .bind(&req.description)
        .bind(req.duration_minutes)
        .bind(price)
        .fetch_one(pool)
        .await
        .map_err(duplicate_name)
    }

    pub async fn update(
        pool: &PgPool,
        tenant: &str,
        id: Uuid,
        req: &UpdateServiceRequest,
    ) -> ApiResult<Service> {
        if matches!(&req.name, Some(name) if name.trim().is_empty()) {
            return Err(ApiError::validation("name cannot be empty"));
        }
        if let Some(minutes) = req.duration_minutes {
            validate_duration(minutes).map_err(ApiError::Validation)?;
        }
        if let Some(price) = req.price_cents {
            validate_price(price).map_err(ApiError::Validation)?;
        }

        let schema = schema_name(tenant);
        sqlx::query_as::<_, Service>(&format!(
            r#"UPDATE "{schema}".services
               SET name = COALESCE($1, name),
                   description = COALESCE($2, description),
                   duration_minutes = COALESCE($3, duration_minutes),
                   price_cents = COALESCE($4, price_cents),
                   is_active = COALESCE($5, is_active)
               WHERE id = $6
               RETURNING *"#
        ))
        .bind(req.name.as_deref().map(str::trim))
        .bind(&req.description)
        .bind(req.duration_minutes)
        .bind(req.price_cents)
        .bind(req.is_active)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(duplicate_name)?
        .ok_or(ApiError::NotFound("Service"))
    }

    /// Soft delete; past bookings still reference the service.
    pub async fn deactivate(pool: &PgPool, tenant: &str, id: Uuid) -> ApiResult<()> {
        let schema = schema_name(tenant);
        let result = sqlx::query(&format!(
            r#"UPDATE "{schema}".services SET is_active = FALSE WHERE id = $1"#
        ))
        .bind(id)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Service"));
        }
        Ok(())
    }
}

fn duplicate_name(e: sqlx::Error) -> ApiError {
    ApiError::from(e).on_conflict("A service with this name already exists")
}
