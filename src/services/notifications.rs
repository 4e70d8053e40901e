use std::sync::Arc;

use sqlx::PgPool;
use tracing::warn;

use crate::{
    models::booking::Booking,
    services::email::{BookingEmail, EmailService},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingNotice {
    Confirmation,
    Cancellation,
    Reminder,
}

/// Shop name and UTC offset used to render booking emails.
pub async fn shop_details(pool: &PgPool, tenant: &str) -> anyhow::Result<(String, i32)> {
    let row: (String, i32) = sqlx::query_as(
        "SELECT name, timezone_offset_minutes FROM public.barbershops WHERE slug = $1",
    )
    .bind(tenant)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn send(
    pool: &PgPool,
    email: &EmailService,
    tenant: &str,
    booking: Booking,
    notice: BookingNotice,
) -> anyhow::Result<()> {
    let (shop_name, timezone_offset_minutes) = shop_details(pool, tenant).await?;
    let info = BookingEmail {
        shop_name,
        timezone_offset_minutes,
        booking,
    };
    match notice {
        BookingNotice::Confirmation => email.send_booking_confirmation(&info).await,
        BookingNotice::Cancellation => email.send_booking_cancellation(&info).await,
        BookingNotice::Reminder => email.send_booking_reminder(&info).await,
    }
}

/// Fire-and-forget booking email. No-op without SMTP or a client address.
pub fn notify(
    pool: PgPool,
    email: Option<Arc<EmailService>>,
    tenant: &str,
    booking: Booking,
    notice: BookingNotice,
) {
    let Some(email) = email else { return };
    if booking.client_email.is_none() {
        return;
    }
    let tenant = tenant.to_string();
    tokio::spawn(async move {
        let id = booking.id;
        if let Err(e) = send(&pool, &email, &tenant, booking, notice).await {
            warn!("Booking email ({notice:?}) failed for {tenant}/{id}: {e}");
        }
    });
}
