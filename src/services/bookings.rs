use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    error::{ApiError, ApiResult, SLOT_TAKEN},
    models::{
        auth::AuthenticatedUser,
        booking::{
            booking_select, Booking, BookingFilter, BookingStatus, CreateBookingRequest,
            DaySummary, StatusCount, UpdateBookingRequest,
        },
        service::Service,
        tenant::shop_offset,
        user::UserRole,
    },
    services::{
        auth::AuthService,
        availability::{day_bounds, fits_in_blocks, overlaps, tenant_offset_minutes, AvailabilityService},
        barbers::BarberService,
        catalog::CatalogService,
        metrics::{BOOKINGS_CANCELLED_COUNTER, BOOKINGS_CREATED_COUNTER, BOOKING_CONFLICTS_COUNTER},
    },
};

const CONFIRMATION_CODE_LEN: usize = 6;
const UPCOMING_LIMIT: i64 = 10;
const CHANGED_MEANWHILE: &str = "Booking was changed by another request, reload and retry";

pub fn confirmation_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CONFIRMATION_CODE_LEN)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// Names of required booking fields absent from `req`. Staff book on behalf
/// of someone else, so they must also name the client.
pub fn missing_fields(req: &CreateBookingRequest, needs_client_name: bool) -> Vec<&'static str> {
    let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
    let mut missing = Vec::new();
    if req.barber_id.is_none() {
        missing.push("barber_id");
    }
    if req.service_id.is_none() {
        missing.push("service_id");
    }
    if blank(&req.start_at) {
        missing.push("start_at");
    }
    if needs_client_name && blank(&req.client_name) {
        missing.push("client_name");
    }
    missing
}

pub fn parse_start(raw: &str) -> ApiResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::validation("start_at must be an RFC 3339 timestamp"))
}

/// Barbers work their own chair: they may not hand a booking to a colleague.
fn may_reassign(role: UserRole, current_barber: Uuid, requested: Option<Uuid>) -> bool {
    match (role, requested) {
        (UserRole::Barber, Some(barber_id)) => barber_id == current_barber,
        _ => true,
    }
}

fn parse_status(raw: &str) -> ApiResult<BookingStatus> {
    raw.parse()
        .map_err(|_| ApiError::validation(format!("Unknown booking status: {raw}")))
}

/// Result of checking that a barber can take a service at a given time.
struct SlotCheck {
    service: Service,
    end_at: DateTime<Utc>,
}

pub struct BookingService;

impl BookingService {
    /// Barber, service, working hours and overlap checks shared by create
    /// and reschedule. `ignore` skips the booking being moved.
    async fn check_slot(
        pool: &PgPool,
        tenant: &str,
        barber_id: Uuid,
        service_id: Uuid,
        start_at: DateTime<Utc>,
        ignore: Option<Uuid>,
    ) -> ApiResult<SlotCheck> {
        if start_at <= Utc::now() {
            return Err(ApiError::validation("start_at must be in the future"));
        }

        let barber = BarberService::get(pool, tenant, barber_id).await?;
        if !barber.is_active {
            return Err(ApiError::validation("This barber is not taking bookings"));
        }
        let service = CatalogService::get(pool, tenant, service_id).await?;
        if !service.is_active {
            return Err(ApiError::validation("This service is no longer offered"));
        }

        let end_at = start_at + Duration::minutes(service.duration_minutes as i64);

        let offset = shop_offset(tenant_offset_minutes(pool, tenant).await?);
        let blocks = AvailabilityService::list(pool, tenant, barber_id).await?;
        if !fits_in_blocks(start_at, end_at, offset, &blocks) {
            return Err(ApiError::validation(
                "Requested time is outside the barber's working hours",
            ));
        }

        let schema = schema_name(tenant);
        let existing: Vec<(Uuid, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(&format!(
            r#"SELECT id, start_at, end_at FROM "{schema}".bookings
               WHERE barber_id = $1 AND status <> 'cancelled'
                 AND start_at < $3 AND end_at > $2"#
        ))
        .bind(barber_id)
        .bind(start_at - Duration::days(1))
        .bind(end_at + Duration::days(1))
        .fetch_all(pool)
        .await?;

        let clash = existing
            .iter()
            .filter(|(id, _, _)| Some(*id) != ignore)
            .any(|&(_, s, e)| overlaps(start_at, end_at, s, e));
        if clash {
            BOOKING_CONFLICTS_COUNTER.with_label_values(&[tenant]).inc();
            return Err(ApiError::conflict(SLOT_TAKEN));
        }

        Ok(SlotCheck { service, end_at })
    }

    fn slot_taken(tenant: &str, e: sqlx::Error) -> ApiError {
        let err = ApiError::from(e).on_conflict(SLOT_TAKEN);
        if matches!(err, ApiError::Conflict(_)) {
            BOOKING_CONFLICTS_COUNTER.with_label_values(&[tenant]).inc();
        }
        err
    }

    pub async fn create(
        pool: &PgPool,
        tenant: &str,
        actor: &AuthenticatedUser,
        req: &CreateBookingRequest,
    ) -> ApiResult<Booking> {
        let is_client = actor.role == UserRole::Client;
        let missing = missing_fields(req, !is_client);
        if !missing.is_empty() {
            return Err(ApiError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        let (Some(barber_id), Some(service_id), Some(raw_start)) =
            (req.barber_id, req.service_id, req.start_at.as_deref())
        else {
            return Err(ApiError::validation("Missing required fields"));
        };
        let start_at = parse_start(raw_start)?;

        // Clients always book for themselves.
        let (client_id, client_name, client_email, client_phone) = if is_client {
            let me = AuthService::find_user(pool, tenant, actor.user_id).await?;
            let phone = req.client_phone.clone().or_else(|| me.phone.clone());
            (Some(me.id), me.full_name(), Some(me.email), phone)
        } else {
            (
                None,
                req.client_name.as_deref().unwrap_or_default().trim().to_string(),
                req.client_email.clone().filter(|s| !s.trim().is_empty()),
                req.client_phone.clone().filter(|s| !s.trim().is_empty()),
            )
        };

        let check = Self::check_slot(pool, tenant, barber_id, service_id, start_at, None).await?;

        let schema = schema_name(tenant);
        let id: Uuid = sqlx::query_scalar(&format!(
            r#"INSERT INTO "{schema}".bookings
                 (barber_id, service_id, client_id, client_name, client_phone, client_email,
                  start_at, end_at, notes, confirmation_code, price_cents)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING id"#
        ))
        .bind(barber_id)
        .bind(service_id)
        .bind(client_id)
        .bind(&client_name)
        .bind(client_phone)
        .bind(client_email)
        .bind(start_at)
        .bind(check.end_at)
        .bind(&req.notes)
        .bind(confirmation_code())
        .bind(check.service.price_cents)
        .fetch_one(pool)
        .await
        .map_err(|e| Self::slot_taken(tenant, e))?;

        BOOKINGS_CREATED_COUNTER.with_label_values(&[tenant]).inc();
        Self::get(pool, tenant, id).await
    }

    pub async fn get(pool: &PgPool, tenant: &str, id: Uuid) -> ApiResult<Booking> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, Booking>(&format!("{} WHERE b.id = $1", booking_select(&schema)))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(ApiError::NotFound("Booking"))
    }

    /// Like [`Self::get`], but bookings outside the actor's view are reported
    /// as missing.
    pub async fn get_visible(
        pool: &PgPool,
        tenant: &str,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> ApiResult<Booking> {
        let booking = Self::get(pool, tenant, id).await?;
        let visible = match actor.role {
            UserRole::SuperAdmin | UserRole::Owner => true,
            UserRole::Client => booking.client_id == Some(actor.user_id),
            UserRole::Barber => BarberService::find_by_user(pool, tenant, actor.user_id)
                .await?
                .is_some_and(|b| b.id == booking.barber_id),
        };
        if visible {
            Ok(booking)
        } else {
            Err(ApiError::NotFound("Booking"))
        }
    }

    pub async fn list(
        pool: &PgPool,
        tenant: &str,
        actor: &AuthenticatedUser,
        filter: &BookingFilter,
    ) -> ApiResult<Vec<Booking>> {
        let status = filter.status.as_deref().map(parse_status).transpose()?;

        let (mut barber_id, mut client_id) = (filter.barber_id, None);
        match actor.role {
            UserRole::SuperAdmin | UserRole::Owner => {}
            UserRole::Client => client_id = Some(actor.user_id),
            UserRole::Barber => {
                match BarberService::find_by_user(pool, tenant, actor.user_id).await? {
                    Some(b) => barber_id = Some(b.id),
                    None => return Ok(Vec::new()),
                }
            }
        }

        let (from, to) = match filter.date {
            Some(date) => {
                let offset = shop_offset(tenant_offset_minutes(pool, tenant).await?);
                let (from, to) =
                    day_bounds(date, offset).ok_or_else(|| ApiError::validation("Invalid date"))?;
                (Some(from), Some(to))
            }
            None => (None, None),
        };

        let schema = schema_name(tenant);
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            r#"{}
               WHERE ($1::UUID IS NULL OR b.barber_id = $1)
                 AND ($2::UUID IS NULL OR b.client_id = $2)
                 AND ($3::TEXT IS NULL OR b.status::TEXT = $3)
                 AND ($4::TIMESTAMPTZ IS NULL OR b.start_at >= $4)
                 AND ($5::TIMESTAMPTZ IS NULL OR b.start_at < $5)
               ORDER BY b.start_at"#,
            booking_select(&schema)
        ))
        .bind(barber_id)
        .bind(client_id)
        .bind(status.map(|s| s.to_string()))
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
        Ok(bookings)
    }

    /// Staff edit: reschedule, move to another barber or service, change
    /// status or notes.
    ///
    /// The write only lands if the row still has the status read here, so
    /// two racing edits cannot both pass the transition check.
    pub async fn update(
        pool: &PgPool,
        tenant: &str,
        actor: &AuthenticatedUser,
        id: Uuid,
        req: &UpdateBookingRequest,
    ) -> ApiResult<Booking> {
        let current = Self::get_visible(pool, tenant, actor, id).await?;
        let current_status = current.status()?;

        if !may_reassign(actor.role, current.barber_id, req.barber_id) {
            return Err(ApiError::Forbidden);
        }

        let next_status = req.status.as_deref().map(parse_status).transpose()?;
        if let Some(next) = next_status {
            if !current_status.can_transition_to(next) {
                return Err(ApiError::conflict(format!(
                    "Cannot change a {current_status} booking to {next}"
                )));
            }
        }

        let moves = req.start_at.is_some() || req.barber_id.is_some() || req.service_id.is_some();
        let (start_at, end_at, price_cents) = if moves {
            if current_status.is_terminal() {
                return Err(ApiError::conflict(format!(
                    "Booking is already {current_status}"
                )));
            }
            let start_at = match req.start_at.as_deref() {
                Some(raw) => parse_start(raw)?,
                None => current.start_at,
            };
            let barber_id = req.barber_id.unwrap_or(current.barber_id);
            let service_id = req.service_id.unwrap_or(current.service_id);
            let check =
                Self::check_slot(pool, tenant, barber_id, service_id, start_at, Some(id)).await?;
            let price = if service_id == current.service_id {
                current.price_cents
            } else {
                check.service.price_cents
            };
            (start_at, check.end_at, price)
        } else {
            (current.start_at, current.end_at, current.price_cents)
        };

        let schema = schema_name(tenant);
        let updated = sqlx::query(&format!(
            r#"UPDATE "{schema}".bookings
               SET barber_id = $1,
                   service_id = $2,
                   start_at = $3,
                   end_at = $4,
                   price_cents = $5,
                   status = COALESCE($6::"{schema}".booking_status, status),
                   notes = COALESCE($7, notes),
                   reminder_sent_at = CASE WHEN $3 <> start_at THEN NULL ELSE reminder_sent_at END
               WHERE id = $8 AND status = $9::"{schema}".booking_status"#
        ))
        .bind(req.barber_id.unwrap_or(current.barber_id))
        .bind(req.service_id.unwrap_or(current.service_id))
        .bind(start_at)
        .bind(end_at)
        .bind(price_cents)
        .bind(next_status.map(|s| s.to_string()))
        .bind(&req.notes)
        .bind(id)
        .bind(current_status.to_string())
        .execute(pool)
        .await
        .map_err(|e| Self::slot_taken(tenant, e))?;

        if updated.rows_affected() == 0 {
            return Err(ApiError::conflict(CHANGED_MEANWHILE));
        }

        if next_status == Some(BookingStatus::Cancelled) && current_status != BookingStatus::Cancelled {
            BOOKINGS_CANCELLED_COUNTER.with_label_values(&[tenant]).inc();
        }

        Self::get(pool, tenant, id).await
    }

    /// Clients may cancel their own bookings, staff any booking they can see.
    /// Only a live booking is cancelled; whoever loses a race gets a 409.
    pub async fn cancel(
        pool: &PgPool,
        tenant: &str,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> ApiResult<Booking> {
        let current = Self::get_visible(pool, tenant, actor, id).await?;
        let status = current.status()?;
        if status.is_terminal() {
            return Err(ApiError::conflict(format!("Booking is already {status}")));
        }

        let schema = schema_name(tenant);
        let cancelled: Option<Uuid> = sqlx::query_scalar(&format!(
            r#"UPDATE "{schema}".bookings SET status = 'cancelled'
               WHERE id = $1 AND status IN ('pending', 'confirmed')
               RETURNING id"#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        if cancelled.is_none() {
            return Err(ApiError::conflict(CHANGED_MEANWHILE));
        }

        BOOKINGS_CANCELLED_COUNTER.with_label_values(&[tenant]).inc();
        Self::get(pool, tenant, id).await
    }

    pub async fn delete(pool: &PgPool, tenant: &str, id: Uuid) -> ApiResult<()> {
        let schema = schema_name(tenant);
        let result = sqlx::query(&format!(r#"DELETE FROM "{schema}".bookings WHERE id = $1"#))
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Booking"));
        }
        Ok(())
    }

    /// Per-status counts, expected revenue and the next live bookings for a
    /// shop-local day. Barbers only see their own chair.
    pub async fn summary(
        pool: &PgPool,
        tenant: &str,
        actor: &AuthenticatedUser,
        date: NaiveDate,
    ) -> ApiResult<DaySummary> {
        let barber_id = match actor.role {
            UserRole::Barber => match BarberService::find_by_user(pool, tenant, actor.user_id).await? {
                Some(b) => Some(b.id),
                None => Some(Uuid::nil()),
            },
            UserRole::Client => return Err(ApiError::Forbidden),
            _ => None,
        };

        let offset = shop_offset(tenant_offset_minutes(pool, tenant).await?);
        let (from, to) =
            day_bounds(date, offset).ok_or_else(|| ApiError::validation("Invalid date"))?;
        let schema = schema_name(tenant);

        let by_status = sqlx::query_as::<_, StatusCount>(&format!(
            r#"SELECT status::TEXT AS status, COUNT(*)::BIGINT AS count
               FROM "{schema}".bookings
               WHERE start_at >= $1 AND start_at < $2
                 AND ($3::UUID IS NULL OR barber_id = $3)
               GROUP BY status
               ORDER BY status"#
        ))
        .bind(from)
        .bind(to)
        .bind(barber_id)
        .fetch_all(pool)
        .await?;

        let expected_revenue_cents: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COALESCE(SUM(price_cents), 0)::BIGINT
               FROM "{schema}".bookings
               WHERE start_at >= $1 AND start_at < $2
                 AND status <> 'cancelled'
                 AND ($3::UUID IS NULL OR barber_id = $3)"#
        ))
        .bind(from)
        .bind(to)
        .bind(barber_id)
        .fetch_one(pool)
        .await?;

        let upcoming = sqlx::query_as::<_, Booking>(&format!(
            r#"{}
               WHERE b.start_at >= GREATEST($1, NOW()) AND b.start_at < $2
                 AND b.status IN ('pending', 'confirmed')
                 AND ($3::UUID IS NULL OR b.barber_id = $3)
               ORDER BY b.start_at
               LIMIT $4"#,
            booking_select(&schema)
        ))
        .bind(from)
        .bind(to)
        .bind(barber_id)
        .bind(UPCOMING_LIMIT)
        .fetch_all(pool)
        .await?;

        Ok(DaySummary {
            date,
            total: by_status.iter().map(|s| s.count).sum(),
            by_status,
            expected_revenue_cents,
            upcoming,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_codes_are_short_and_uppercase() {
        let code = confirmation_code();
        assert_eq!(code.len(), CONFIRMATION_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn missing_fields_are_listed() {
        let empty = CreateBookingRequest::default();
        assert_eq!(missing_fields(&empty, false), vec!["barber_id", "service_id", "start_at"]);
        assert_eq!(
            missing_fields(&empty, true),
            vec!["barber_id", "service_id", "start_at", "client_name"]
        );

        let full = CreateBookingRequest {
            barber_id: Some(Uuid::new_v4()),
            service_id: Some(Uuid::new_v4()),
            start_at: Some("2030-05-15T09:00:00Z".into()),
            client_name: Some("  ".into()),
            ..Default::default()
        };
        assert!(missing_fields(&full, false).is_empty());
        assert_eq!(missing_fields(&full, true), vec!["client_name"]);
    }

    #[test]
    fn barbers_cannot_hand_bookings_over() {
        let own = Uuid::new_v4();
        let colleague = Uuid::new_v4();
        assert!(may_reassign(UserRole::Barber, own, None));
        assert!(may_reassign(UserRole::Barber, own, Some(own)));
        assert!(!may_reassign(UserRole::Barber, own, Some(colleague)));
        assert!(may_reassign(UserRole::Owner, own, Some(colleague)));
        assert!(may_reassign(UserRole::SuperAdmin, own, Some(colleague)));
    }

    #[test]
    fn start_must_be_rfc3339() {
        let parsed = parse_start("2030-05-15T09:00:00-05:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2030-05-15T14:00:00+00:00");
        assert!(matches!(parse_start("15/05/2030 09:00"), Err(ApiError::Validation(_))));
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        assert_eq!(parse_status("no_show").unwrap(), BookingStatus::NoShow);
        assert!(matches!(parse_status("done"), Err(ApiError::Validation(_))));
    }
}
