use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    db::tenant::schema_name,
    models::booking::{booking_select, Booking},
    services::{
        email::EmailService,
        notifications::{self, BookingNotice},
    },
};

const TICK_SECS: u64 = 15 * 60;
const LOOKAHEAD_HOURS: i64 = 24;

/// Spawn a background task that emails a reminder for every live booking
/// starting in the next 24 hours. `reminder_sent_at` is stamped after each
/// send so restarts never send twice.
pub fn start(pool: PgPool, email: Option<Arc<EmailService>>) {
    let Some(email) = email else {
        info!("Reminder scheduler disabled: SMTP not configured");
        return;
    };
    tokio::spawn(async move {
        loop {
            if let Err(e) = run_once(&pool, &email).await {
                warn!("Reminder scheduler: run failed: {e}");
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(TICK_SECS)).await;
        }
    });
}

async fn run_once(pool: &PgPool, email: &EmailService) -> anyhow::Result<()> {
    let tenants: Vec<String> =
        sqlx::query_scalar("SELECT slug FROM public.barbershops WHERE is_active = TRUE")
            .fetch_all(pool)
            .await?;

    let mut sent = 0usize;
    for slug in &tenants {
        match remind_tenant(pool, email, slug).await {
            Ok(n) => sent += n,
            Err(e) => warn!("Reminder scheduler: tenant '{slug}' failed: {e}"),
        }
    }
    if sent > 0 {
        info!("Reminder scheduler: sent {sent} reminder(s)");
    }
    Ok(())
}

async fn remind_tenant(pool: &PgPool, email: &EmailService, slug: &str) -> anyhow::Result<usize> {
    let schema = schema_name(slug);
    let due = sqlx::query_as::<_, Booking>(&format!(
        r#"{}
           WHERE b.status IN ('pending', 'confirmed')
             AND b.reminder_sent_at IS NULL
             AND b.client_email IS NOT NULL
             AND b.start_at > NOW()
             AND b.start_at <= NOW() + $1 * INTERVAL '1 hour'
           ORDER BY b.start_at"#,
        booking_select(&schema)
    ))
    .bind(LOOKAHEAD_HOURS as f64)
    .fetch_all(pool)
    .await?;

    let mut sent = 0;
    for booking in due {
        let id = booking.id;
        if let Err(e) = notifications::send(pool, email, slug, booking, BookingNotice::Reminder).await {
            warn!("Reminder scheduler: booking {slug}/{id} failed: {e}");
            continue;
        }
        sqlx::query(&format!(
            r#"UPDATE "{schema}".bookings SET reminder_sent_at = NOW() WHERE id = $1"#
        ))
        .bind(id)
        .execute(pool)
        .await?;
        sent += 1;
    }
    Ok(sent)
}
