use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Recurring weekly working hours of a barber. `weekday` 0 is Monday.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AvailabilityBlock {
    pub id: Uuid,
    pub barber_id: Uuid,
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlockInput {
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct SetAvailabilityRequest {
    pub blocks: Vec<BlockInput>,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub barber_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

/// A candidate start time, expressed in the shop's local offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub start_at: DateTime<FixedOffset>,
    pub end_at: DateTime<FixedOffset>,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub barber_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub duration_minutes: i32,
    pub slots: Vec<Slot>,
}
