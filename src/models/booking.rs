use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    /// Pending and confirmed bookings can move anywhere except back to
    /// pending; terminal states never change.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next != BookingStatus::Pending || self == BookingStatus::Pending
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "no_show" => Ok(BookingStatus::NoShow),
            _ => Err(anyhow::anyhow!("Unknown booking status: {s}")),
        }
    }
}

/// Booking row joined with the barber and service names.
/// `status` is fetched as TEXT for the same per-schema enum reason as user roles.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub barber_id: Uuid,
    pub barber_name: String,
    pub service_id: Uuid,
    pub service_name: String,
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: String,
    pub notes: Option<String>,
    pub confirmation_code: String,
    pub price_cents: i32,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Parsed status. A value outside the enum means the schema and this
    /// build disagree, so it is an internal error rather than a guess.
    pub fn status(&self) -> ApiResult<BookingStatus> {
        self.status.parse().map_err(|e: anyhow::Error| {
            tracing::error!("booking {} has unreadable status '{}'", self.id, self.status);
            ApiError::Internal(e)
        })
    }
}

/// SELECT list + joins for [`Booking`]. Callers append WHERE/ORDER clauses.
pub fn booking_select(schema: &str) -> String {
    format!(
        r#"SELECT b.id, b.barber_id, br.display_name AS barber_name,
                  b.service_id, s.name AS service_name,
                  b.client_id, b.client_name, b.client_phone, b.client_email,
                  b.start_at, b.end_at, b.status::TEXT AS status, b.notes,
                  b.confirmation_code, b.price_cents, b.reminder_sent_at,
                  b.created_at, b.updated_at
           FROM "{schema}".bookings b
           JOIN "{schema}".barbers br ON br.id = b.barber_id
           JOIN "{schema}".services s ON s.id = b.service_id"#
    )
}

/// Every field is optional so that missing ones are reported as a 400 with
/// a field list instead of a JSON deserialization rejection.
#[derive(Debug, Default, Deserialize)]
pub struct CreateBookingRequest {
    pub barber_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub start_at: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBookingRequest {
    pub start_at: Option<String>,
    pub barber_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingFilter {
    pub date: Option<NaiveDate>,
    pub barber_id: Option<Uuid>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub total: i64,
    pub by_status: Vec<StatusCount>,
    pub expected_revenue_cents: i64,
    pub upcoming: Vec<Booking>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::BookingStatus::*;
    use super::*;

    #[test]
    fn terminal_states_are_frozen() {
        for from in [Completed, Cancelled, NoShow] {
            for to in [Pending, Confirmed, Completed, Cancelled, NoShow] {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn live_states_move_forward() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(NoShow));
        assert!(!Confirmed.can_transition_to(Pending));
    }

    fn booking_with_status(status: &str) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            barber_id: Uuid::new_v4(),
            barber_name: "Marco".into(),
            service_id: Uuid::new_v4(),
            service_name: "Classic cut".into(),
            client_id: None,
            client_name: "Ana Ruiz".into(),
            client_phone: None,
            client_email: None,
            start_at: Utc::now(),
            end_at: Utc::now(),
            status: status.into(),
            notes: None,
            confirmation_code: "ABC123".into(),
            price_cents: 2500,
            reminder_sent_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unreadable_status_is_an_error_not_pending() {
        assert_eq!(booking_with_status("no_show").status().unwrap(), NoShow);
        let err = booking_with_status("archived").status().unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn status_text_round_trip() {
        for s in [Pending, Confirmed, Completed, Cancelled, NoShow] {
            assert_eq!(s.to_string().parse::<BookingStatus>().unwrap(), s);
        }
        assert!("done".parse::<BookingStatus>().is_err());
    }
}
