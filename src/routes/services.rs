use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::Rejection,
    middleware::tenant::TenantSlug,
    models::{
        auth::AuthenticatedUser,
        service::{CreateServiceRequest, UpdateServiceRequest},
        user::UserRole,
    },
    routes::{authorize, barbers::ListQuery},
    services::{
        audit::{self, AuditEntry},
        catalog::CatalogService,
    },
    AppState,
};

/// Public service menu. Inactive entries are only listed on request.
pub async fn list_services(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    Query(q): Query<ListQuery>,
) -> Result<Json<Value>, Rejection> {
    CatalogService::list(&state.db, &tenant, q.include_inactive.unwrap_or(false))
        .await
        .map(|services| Json(json!(services)))
        .map_err(|e| state.reject(e))
}

pub async fn create_service(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Json(body): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Value>), Rejection> {
    authorize(&user, &tenant, UserRole::is_owner)?;
    let service = CatalogService::create(&state.db, &tenant, &body)
        .await
        .map_err(|e| state.reject(e))?;
    audit::log(
        state.db.clone(),
        &tenant,
        AuditEntry::new(user.user_id, "service.create", "service", service.id),
    );
    Ok((StatusCode::CREATED, Json(json!(service))))
}

pub async fn update_service(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateServiceRequest>,
) -> Result<Json<Value>, Rejection> {
    authorize(&user, &tenant, UserRole::is_owner)?;
    let service = CatalogService::update(&state.db, &tenant, id, &body)
        .await
        .map_err(|e| state.reject(e))?;
    audit::log(
        state.db.clone(),
        &tenant,
        AuditEntry::new(user.user_id, "service.update", "service", id),
    );
    Ok(Json(json!(service)))
}

pub async fn delete_service(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    authorize(&user, &tenant, UserRole::is_owner)?;
    CatalogService::deactivate(&state.db, &tenant, id)
        .await
        .map_err(|e| state.reject(e))?;
    audit::log(
        state.db.clone(),
        &tenant,
        AuditEntry::new(user.user_id, "service.deactivate", "service", id),
    );
    Ok(StatusCode::NO_CONTENT)
}
