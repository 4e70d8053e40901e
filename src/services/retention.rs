use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::{db::tenant::schema_name, middleware::tenant::is_valid_slug};

pub const DEFAULT_RETENTION_DAYS: i64 = 365;

/// Bookings that ended before this instant are eligible for purging.
pub fn cutoff(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days.max(0))
}

pub struct RetentionService;

impl RetentionService {
    /// Deletes cancelled bookings and any booking that ended before the
    /// retention cutoff, plus expired or revoked refresh tokens. Returns the
    /// number of bookings removed.
    pub async fn purge_tenant(pool: &PgPool, tenant: &str, days: i64) -> anyhow::Result<u64> {
        if !is_valid_slug(tenant) {
            anyhow::bail!("invalid tenant slug: {tenant}");
        }
        let schema = schema_name(tenant);
        let cutoff = cutoff(Utc::now(), days);

        let bookings = sqlx::query(&format!(
            r#"DELETE FROM "{schema}".bookings
               WHERE (status = 'cancelled' AND end_at < NOW())
                  OR end_at < $1"#
        ))
        .bind(cutoff)
        .execute(pool)
        .await?
        .rows_affected();

        let tokens = sqlx::query(&format!(
            r#"DELETE FROM "{schema}".refresh_tokens WHERE revoked = TRUE OR expires_at < NOW()"#
        ))
        .execute(pool)
        .await?
        .rows_affected();

        tracing::info!(
            "Purged {bookings} booking(s) and {tokens} refresh token(s) from {schema}"
        );
        Ok(bookings)
    }

    pub async fn active_tenants(pool: &PgPool) -> anyhow::Result<Vec<String>> {
        let slugs = sqlx::query_scalar("SELECT slug FROM public.barbershops WHERE is_active = TRUE")
            .fetch_all(pool)
            .await?;
        Ok(slugs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cutoff_counts_back_whole_days() {
        let now = Utc.with_ymd_and_hms(2030, 5, 15, 12, 0, 0).unwrap();
        assert_eq!(cutoff(now, 365), Utc.with_ymd_and_hms(2029, 5, 15, 12, 0, 0).unwrap());
        assert_eq!(cutoff(now, -3), now);
    }
}
