use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Barber {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub display_name: String,
    pub bio: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional login for the barber, created alongside the barber row.
#[derive(Debug, Deserialize)]
pub struct StaffAccountRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBarberRequest {
    pub display_name: String,
    pub bio: Option<String>,
    pub account: Option<StaffAccountRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBarberRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub is_active: Option<bool>,
}
