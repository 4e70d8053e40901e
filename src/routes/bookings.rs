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
        booking::{BookingFilter, BookingStatus, CreateBookingRequest, UpdateBookingRequest},
        user::UserRole,
    },
    routes::{any_role, authorize},
    services::{
        audit::{self, AuditEntry},
        bookings::BookingService,
        notifications::{notify, BookingNotice},
    },
    AppState,
};

pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Value>), Rejection> {
    authorize(&user, &tenant, any_role)?;
    let booking = BookingService::create(&state.db, &tenant, &user, &body)
        .await
        .map_err(|e| state.reject(e))?;

    tracing::info!(
        "Booking {} created in {tenant} for barber {} at {}",
        booking.id,
        booking.barber_id,
        booking.start_at
    );
    audit::log(
        state.db.clone(),
        &tenant,
        AuditEntry::new(user.user_id, "booking.create", "booking", booking.id),
    );
    notify(
        state.db.clone(),
        state.email.clone(),
        &tenant,
        booking.clone(),
        BookingNotice::Confirmation,
    );
    Ok((StatusCode::CREATED, Json(json!(booking))))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Value>, Rejection> {
    authorize(&user, &tenant, any_role)?;
    BookingService::list(&state.db, &tenant, &user, &filter)
        .await
        .map(|bookings| Json(json!(bookings)))
        .map_err(|e| state.reject(e))
}

pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, Rejection> {
    authorize(&user, &tenant, any_role)?;
    BookingService::get_visible(&state.db, &tenant, &user, id)
        .await
        .map(|booking| Json(json!(booking)))
        .map_err(|e| state.reject(e))
}

pub async fn update_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBookingRequest>,
) -> Result<Json<Value>, Rejection> {
    authorize(&user, &tenant, UserRole::is_staff)?;
    let before = BookingService::get_visible(&state.db, &tenant, &user, id)
        .await
        .map_err(|e| state.reject(e))?;
    let booking = BookingService::update(&state.db, &tenant, &user, id, &body)
        .await
        .map_err(|e| state.reject(e))?;

    audit::log(
        state.db.clone(),
        &tenant,
        AuditEntry::new(user.user_id, "booking.update", "booking", id),
    );
    let now_cancelled = booking.status().ok() == Some(BookingStatus::Cancelled)
        && before.status().ok() != Some(BookingStatus::Cancelled);
    if now_cancelled {
        notify(state.db.clone(), state.email.clone(), &tenant, booking.clone(), BookingNotice::Cancellation);
    } else if booking.start_at != before.start_at || booking.barber_id != before.barber_id {
        notify(state.db.clone(), state.email.clone(), &tenant, booking.clone(), BookingNotice::Confirmation);
    }
    Ok(Json(json!(booking)))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, Rejection> {
    authorize(&user, &tenant, any_role)?;
    let booking = BookingService::cancel(&state.db, &tenant, &user, id)
        .await
        .map_err(|e| state.reject(e))?;

    tracing::info!("Booking {id} cancelled in {tenant}");
    audit::log(
        state.db.clone(),
        &tenant,
        AuditEntry::new(user.user_id, "booking.cancel", "booking", id),
    );
    notify(
        state.db.clone(),
        state.email.clone(),
        &tenant,
        booking.clone(),
        BookingNotice::Cancellation,
    );
    Ok(Json(json!(booking)))
}

pub async fn delete_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    authorize(&user, &tenant, UserRole::is_owner)?;
    BookingService::delete(&state.db, &tenant, id)
        .await
        .map_err(|e| state.reject(e))?;
    audit::log(
        state.db.clone(),
        &tenant,
        AuditEntry::new(user.user_id, "booking.delete", "booking", id),
    );
    Ok(StatusCode::NO_CONTENT)
}
