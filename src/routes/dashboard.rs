use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::Rejection,
    middleware::tenant::TenantSlug,
    models::{auth::AuthenticatedUser, tenant::shop_offset, user::UserRole},
    routes::authorize,
    services::{availability::tenant_offset_minutes, bookings::BookingService},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub date: Option<NaiveDate>,
}

/// Day overview for staff. Defaults to today in shop time.
pub async fn summary(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<Value>, Rejection> {
    authorize(&user, &tenant, UserRole::is_staff)?;

    let date = match q.date {
        Some(date) => date,
        None => {
            let minutes = tenant_offset_minutes(&state.db, &tenant)
                .await
                .map_err(|e| state.reject(e))?;
            Utc::now().with_timezone(&shop_offset(minutes)).date_naive()
        }
    };

    BookingService::summary(&state.db, &tenant, &user, date)
        .await
        .map(|summary| Json(json!(summary)))
        .map_err(|e| state.reject(e))
}
