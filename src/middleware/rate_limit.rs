use axum::http::StatusCode;

use crate::error::{reject, Rejection};

/// Fixed-window rate limit stored in Redis.
///
/// Uses the INCR + EXPIRE strategy:
/// - Increments a counter for `key`
/// - On first increment, sets TTL to `window_secs`
/// - Returns 429 if counter exceeds `max_attempts`
///
/// When Redis is unreachable the request is let through and a warning logged.
pub async fn check_rate_limit(
    redis: &redis::Client,
    key: &str,
    max_attempts: u64,
    window_secs: u64,
) -> Result<(), Rejection> {
    let mut conn = match redis.get_multiplexed_async_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("rate limit skipped for {key}: redis unavailable: {e}");
            return Ok(());
        }
    };

    let count: u64 = redis::cmd("INCR")
        .arg(key)
        .query_async(&mut conn)
        .await
        .unwrap_or(0);

    if count == 1 {
        // TTL only on first hit so retries do not extend the window
        let _: Result<(), _> = redis::cmd("EXPIRE")
            .arg(key)
            .arg(window_secs)
            .query_async(&mut conn)
            .await;
    }

    if count > max_attempts {
        return Err(reject(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts. Try again in a few minutes.",
        ));
    }

    Ok(())
}
