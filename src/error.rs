use axum::{http::StatusCode, Json};
use serde_json::{json, Value};
use thiserror::Error;

/// Error type shared by the service layer. Route handlers turn it into the
/// `(StatusCode, Json)` rejection pair every endpoint returns.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Rejection pair used by every handler.
pub type Rejection = (StatusCode, Json<Value>);

const UNIQUE_VIOLATION: &str = "23505";
const EXCLUSION_VIOLATION: &str = "23P01";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// Reported for any double booking, whether caught before the insert or by
/// the `bookings_no_overlap` exclusion constraint.
pub const SLOT_TAKEN: &str = "This time slot overlaps an existing booking";

/// Client-facing status for the SQLSTATEs the schema can raise on bad input.
/// Anything else is a server error.
pub fn status_for_sqlstate(code: &str) -> Option<StatusCode> {
    match code {
        UNIQUE_VIOLATION | EXCLUSION_VIOLATION => Some(StatusCode::CONFLICT),
        FOREIGN_KEY_VIOLATION | CHECK_VIOLATION => Some(StatusCode::BAD_REQUEST),
        _ => None,
    }
}

fn message_for_sqlstate(code: &str) -> Option<&'static str> {
    match code {
        EXCLUSION_VIOLATION => Some(SLOT_TAKEN),
        UNIQUE_VIOLATION => Some("Resource already exists"),
        FOREIGN_KEY_VIOLATION => Some("Referenced resource does not exist"),
        CHECK_VIOLATION => Some("Invalid value"),
        _ => None,
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    /// Replaces a 409-mapped database error with a domain message.
    pub fn on_conflict(self, msg: &str) -> Self {
        if self.status() == StatusCode::CONFLICT {
            ApiError::Conflict(msg.to_string())
        } else {
            self
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(e) => match sqlstate(e).as_deref().and_then(status_for_sqlstate) {
                Some(status) => status,
                None if matches!(e, sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
                None => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts into the handler rejection. Internal messages are only
    /// passed through outside production.
    pub fn into_rejection(self, expose_internal: bool) -> Rejection {
        let status = self.status();
        let message = match &self {
            ApiError::Database(e) => match sqlstate(e).as_deref().and_then(message_for_sqlstate) {
                Some(msg) => msg.to_string(),
                None if status == StatusCode::NOT_FOUND => "Resource not found".to_string(),
                None => internal_message(&self, expose_internal),
            },
            ApiError::Internal(_) => internal_message(&self, expose_internal),
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message })))
    }
}

fn internal_message(err: &ApiError, expose_internal: bool) -> String {
    tracing::error!("internal error: {err:#}");
    if expose_internal {
        err.to_string()
    } else {
        "Internal server error".to_string()
    }
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

/// Shorthand for building a rejection without going through `ApiError`.
pub fn reject(status: StatusCode, msg: impl Into<String>) -> Rejection {
    (status, Json(json!({ "error": msg.into() })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_their_status() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("Booking").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("taken").status(), StatusCode::CONFLICT);
    }

    #[test]
    fn row_not_found_is_404() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let (status, Json(body)) = err.into_rejection(false);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Resource not found");
    }

    #[test]
    fn internal_message_hidden_in_production() {
        let (status, Json(body)) =
            ApiError::from(anyhow::anyhow!("smtp exploded")).into_rejection(false);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");

        let (_, Json(body)) =
            ApiError::from(anyhow::anyhow!("smtp exploded")).into_rejection(true);
        assert_eq!(body["error"], "smtp exploded");
    }

    #[test]
    fn constraint_violations_are_client_errors() {
        assert_eq!(status_for_sqlstate("23505"), Some(StatusCode::CONFLICT));
        assert_eq!(status_for_sqlstate("23P01"), Some(StatusCode::CONFLICT));
        assert_eq!(status_for_sqlstate("23503"), Some(StatusCode::BAD_REQUEST));
        assert_eq!(status_for_sqlstate("23514"), Some(StatusCode::BAD_REQUEST));
        // deadlock, connection failure
        assert_eq!(status_for_sqlstate("40P01"), None);
        assert_eq!(status_for_sqlstate("08006"), None);
    }

    #[test]
    fn exclusion_violation_reads_as_double_booking() {
        assert_eq!(message_for_sqlstate("23P01"), Some(SLOT_TAKEN));
        assert_eq!(message_for_sqlstate("23505"), Some("Resource already exists"));
        assert_eq!(message_for_sqlstate("23503"), Some("Referenced resource does not exist"));
        assert_eq!(message_for_sqlstate("23514"), Some("Invalid value"));
        assert_eq!(message_for_sqlstate("42P01"), None);
    }

    #[test]
    fn on_conflict_only_rewrites_conflicts() {
        let err = ApiError::conflict("Resource already exists").on_conflict("Email taken");
        assert_eq!(err.to_string(), "Email taken");
        let err = ApiError::validation("bad").on_conflict("Email taken");
        assert_eq!(err.to_string(), "bad");
    }

    #[test]
    fn not_found_names_the_resource() {
        let (_, Json(body)) = ApiError::NotFound("Barber").into_rejection(true);
        assert_eq!(body["error"], "Barber not found");
    }
}
