use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::Rejection,
    middleware::super_admin::SuperAdminAuth,
    models::tenant::{CreateBarbershopRequest, UpdateBarbershopRequest},
    services::tenants::TenantService,
    AppState,
};

pub async fn list_barbershops(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
) -> Result<Json<Value>, Rejection> {
    TenantService::list(&state.db)
        .await
        .map(|shops| Json(json!(shops)))
        .map_err(|e| state.reject(e))
}

pub async fn create_barbershop(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
    Json(body): Json<CreateBarbershopRequest>,
) -> Result<(StatusCode, Json<Value>), Rejection> {
    let shop = TenantService::create(&state.db, &body)
        .await
        .map_err(|e| state.reject(e))?;
    tracing::info!("Barbershop created by super-admin: {}", shop.slug);
    Ok((StatusCode::CREATED, Json(json!(shop))))
}

pub async fn update_barbershop(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
    Path(slug): Path<String>,
    Json(body): Json<UpdateBarbershopRequest>,
) -> Result<Json<Value>, Rejection> {
    TenantService::update(&state.db, &slug, &body)
        .await
        .map(|shop| Json(json!(shop)))
        .map_err(|e| state.reject(e))
}

/// Drops the tenant schema with every booking in it.
pub async fn delete_barbershop(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
    Path(slug): Path<String>,
) -> Result<StatusCode, Rejection> {
    TenantService::remove(&state.db, &slug.to_lowercase())
        .await
        .map_err(|e| state.reject(e))?;
    tracing::info!("Barbershop deleted: {slug}");
    Ok(StatusCode::NO_CONTENT)
}
