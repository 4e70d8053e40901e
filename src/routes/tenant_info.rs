use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{
    error::Rejection, middleware::tenant::TenantSlug, services::tenants::TenantService, AppState,
};

/// Public shop card: name, contact details and the UTC offset its hours use.
pub async fn get_tenant_info(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
) -> Result<Json<Value>, Rejection> {
    let shop = TenantService::get(&state.db, &tenant)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(json!({
        "slug": shop.slug,
        "name": shop.name,
        "phone": shop.phone,
        "address": shop.address,
        "timezone_offset_minutes": shop.timezone_offset_minutes,
    })))
}
