use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    Owner,
    Barber,
    Client,
}

impl UserRole {
    /// Owners and barbers work in the shop; clients only book.
    pub fn is_staff(self) -> bool {
        matches!(self, UserRole::SuperAdmin | UserRole::Owner | UserRole::Barber)
    }

    pub fn is_owner(self) -> bool {
        matches!(self, UserRole::SuperAdmin | UserRole::Owner)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserRole::SuperAdmin => "super_admin",
            UserRole::Owner => "owner",
            UserRole::Barber => "barber",
            UserRole::Client => "client",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(UserRole::SuperAdmin),
            "owner" => Ok(UserRole::Owner),
            "barber" => Ok(UserRole::Barber),
            "client" => Ok(UserRole::Client),
            _ => Err(anyhow::anyhow!("Unknown role: {s}")),
        }
    }
}

/// DB row struct. Role is fetched as TEXT (`role::TEXT`) because the enum
/// type lives in each tenant schema and has a different OID per tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Column list matching [`User`], with the role cast to TEXT.
pub const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone,
    role::TEXT AS role, is_active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

// Request/Response DTOs
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
    pub barbershop_name: String,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            phone: u.phone,
            role: u.role.parse().unwrap_or(UserRole::Client),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        for role in [UserRole::SuperAdmin, UserRole::Owner, UserRole::Barber, UserRole::Client] {
            let parsed: UserRole = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("admin_garage".parse::<UserRole>().is_err());
    }

    #[test]
    fn staff_and_owner_flags() {
        assert!(UserRole::Barber.is_staff());
        assert!(!UserRole::Barber.is_owner());
        assert!(UserRole::Owner.is_owner());
        assert!(!UserRole::Client.is_staff());
    }

    #[test]
    fn unknown_role_in_row_degrades_to_client() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.c".into(),
            password_hash: "x".into(),
            first_name: "Ana".into(),
            last_name: "Ruiz".into(),
            phone: None,
            role: "mystery".into(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let profile = UserProfile::from(user);
        assert_eq!(profile.role, UserRole::Client);
    }
}
