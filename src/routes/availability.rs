use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{ApiError, Rejection},
    middleware::tenant::TenantSlug,
    models::{
        auth::AuthenticatedUser,
        availability::{SetAvailabilityRequest, SlotQuery},
        user::UserRole,
    },
    routes::{any_role, authorize},
    services::{
        audit::{self, AuditEntry},
        availability::AvailabilityService,
        barbers::BarberService,
    },
    AppState,
};

pub async fn get_schedule(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Path(barber_id): Path<Uuid>,
) -> Result<Json<Value>, Rejection> {
    authorize(&user, &tenant, any_role)?;
    AvailabilityService::list(&state.db, &tenant, barber_id)
        .await
        .map(|blocks| Json(json!(blocks)))
        .map_err(|e| state.reject(e))
}

/// Replaces the weekly hours. Owners edit anyone, barbers only themselves.
pub async fn set_schedule(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Path(barber_id): Path<Uuid>,
    Json(body): Json<SetAvailabilityRequest>,
) -> Result<Json<Value>, Rejection> {
    authorize(&user, &tenant, UserRole::is_staff)?;
    if user.role == UserRole::Barber {
        let own = BarberService::find_by_user(&state.db, &tenant, user.user_id)
            .await
            .map_err(|e| state.reject(e))?;
        if own.map(|b| b.id) != Some(barber_id) {
            return Err(state.reject(ApiError::Forbidden));
        }
    }

    let blocks = AvailabilityService::replace(&state.db, &tenant, barber_id, &body.blocks)
        .await
        .map_err(|e| state.reject(e))?;
    audit::log(
        state.db.clone(),
        &tenant,
        AuditEntry::new(user.user_id, "availability.replace", "barber", barber_id),
    );
    Ok(Json(json!(blocks)))
}

/// GET /availability?barber_id=&service_id=&date=YYYY-MM-DD
pub async fn list_slots(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    Query(q): Query<SlotQuery>,
) -> Result<Json<Value>, Rejection> {
    let (Some(barber_id), Some(service_id), Some(date)) = (q.barber_id, q.service_id, q.date)
    else {
        return Err(state.reject(ApiError::validation(
            "barber_id, service_id and date are required",
        )));
    };

    AvailabilityService::slots(
        &state.db,
        &tenant,
        barber_id,
        service_id,
        date,
        state.config.slot_interval_minutes,
    )
    .await
    .map(|slots| Json(json!(slots)))
    .map_err(|e| state.reject(e))
}
