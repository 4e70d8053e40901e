use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{ApiError, Rejection},
    middleware::tenant::TenantSlug,
    models::{
        auth::AuthenticatedUser,
        barber::{CreateBarberRequest, UpdateBarberRequest},
        user::UserRole,
    },
    routes::{any_role, authorize},
    services::{
        audit::{self, AuditEntry},
        barbers::BarberService,
    },
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub include_inactive: Option<bool>,
}

/// Clients only ever see active barbers.
pub async fn list_barbers(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Query(q): Query<ListQuery>,
) -> Result<Json<Value>, Rejection> {
    authorize(&user, &tenant, any_role)?;
    let include_inactive = user.role.is_staff() && q.include_inactive.unwrap_or(false);
    BarberService::list(&state.db, &tenant, include_inactive)
        .await
        .map(|barbers| Json(json!(barbers)))
        .map_err(|e| state.reject(e))
}

pub async fn get_barber(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, Rejection> {
    authorize(&user, &tenant, any_role)?;
    let barber = BarberService::get(&state.db, &tenant, id)
        .await
        .map_err(|e| state.reject(e))?;
    if !barber.is_active && !user.role.is_staff() {
        return Err(state.reject(ApiError::NotFound("Barber")));
    }
    Ok(Json(json!(barber)))
}

pub async fn create_barber(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Json(body): Json<CreateBarberRequest>,
) -> Result<(StatusCode, Json<Value>), Rejection> {
    authorize(&user, &tenant, UserRole::is_owner)?;
    let barber = BarberService::create(&state.db, &tenant, &body)
        .await
        .map_err(|e| state.reject(e))?;
    audit::log(
        state.db.clone(),
        &tenant,
        AuditEntry::new(user.user_id, "barber.create", "barber", barber.id),
    );
    Ok((StatusCode::CREATED, Json(json!(barber))))
}

pub async fn update_barber(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBarberRequest>,
) -> Result<Json<Value>, Rejection> {
    authorize(&user, &tenant, UserRole::is_owner)?;
    let barber = BarberService::update(&state.db, &tenant, id, &body)
        .await
        .map_err(|e| state.reject(e))?;
    audit::log(
        state.db.clone(),
        &tenant,
        AuditEntry::new(user.user_id, "barber.update", "barber", id),
    );
    Ok(Json(json!(barber)))
}

/// Soft delete: the barber disappears from booking flows, history stays.
pub async fn delete_barber(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    authorize(&user, &tenant, UserRole::is_owner)?;
    BarberService::deactivate(&state.db, &tenant, id)
        .await
        .map_err(|e| state.reject(e))?;
    audit::log(
        state.db.clone(),
        &tenant,
        AuditEntry::new(user.user_id, "barber.deactivate", "barber", id),
    );
    Ok(StatusCode::NO_CONTENT)
}
