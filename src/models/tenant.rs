use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_type", rename_all = "snake_case")]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Free,
    Standard,
    Premium,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Barbershop {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub timezone_offset_minutes: i32,
    pub plan: PlanType,
    pub is_active: bool,
    pub trial_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fixed UTC offset the shop's wall-clock hours are expressed in.
/// Out-of-range values fall back to UTC.
pub fn shop_offset(timezone_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(timezone_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}

#[derive(Debug, Deserialize)]
pub struct CreateBarbershopRequest {
    pub slug: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub timezone_offset_minutes: Option<i32>,
    pub plan: Option<PlanType>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBarbershopRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub timezone_offset_minutes: Option<i32>,
    pub plan: Option<PlanType>,
    pub is_active: Option<bool>,
    /// When true, removes the trial limit entirely.
    pub clear_trial: Option<bool>,
    pub trial_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub slug: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub timezone_offset_minutes: Option<i32>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}
