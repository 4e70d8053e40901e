use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Gauge, GaugeVec,
};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::db::tenant::schema_name;

lazy_static! {
    // ── Event counters ──────────────────────────────────────────────────────
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "api_logins_total",
        "Login attempts by tenant and status",
        &["tenant", "status"]
    ).unwrap();

    pub static ref BOOKINGS_CREATED_COUNTER: CounterVec = register_counter_vec!(
        "api_bookings_created_total",
        "Bookings created by tenant",
        &["tenant"]
    ).unwrap();

    pub static ref BOOKING_CONFLICTS_COUNTER: CounterVec = register_counter_vec!(
        "api_booking_conflicts_total",
        "Booking attempts rejected because the slot was taken",
        &["tenant"]
    ).unwrap();

    pub static ref BOOKINGS_CANCELLED_COUNTER: CounterVec = register_counter_vec!(
        "api_bookings_cancelled_total",
        "Bookings cancelled by tenant",
        &["tenant"]
    ).unwrap();

    // ── Business gauges ─────────────────────────────────────────────────────
    pub static ref BARBERS_GAUGE: GaugeVec = register_gauge_vec!(
        "barbershop_barbers_active_total",
        "Active barbers per tenant",
        &["tenant"]
    ).unwrap();

    pub static ref SERVICES_GAUGE: GaugeVec = register_gauge_vec!(
        "barbershop_services_active_total",
        "Active services per tenant",
        &["tenant"]
    ).unwrap();

    pub static ref UPCOMING_BOOKINGS_GAUGE: GaugeVec = register_gauge_vec!(
        "barbershop_bookings_upcoming_total",
        "Pending or confirmed bookings in the future per tenant",
        &["tenant"]
    ).unwrap();

    pub static ref TENANTS_GAUGE: Gauge = register_gauge!(
        "barbershop_tenants_active_total",
        "Number of active barbershops"
    ).unwrap();
}

/// Spawn the background metrics collector (refreshes every 5 minutes).
pub fn start(pool: PgPool) {
    tokio::spawn(async move {
        if let Err(e) = collect(&pool).await {
            warn!("Metrics: initial collection failed: {}", e);
        }
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
            if let Err(e) = collect(&pool).await {
                warn!("Metrics: collection failed: {}", e);
            }
        }
    });
}

async fn count(pool: &PgPool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.unwrap_or(0)
}

async fn collect(pool: &PgPool) -> anyhow::Result<()> {
    let tenants: Vec<String> =
        sqlx::query_scalar("SELECT slug FROM public.barbershops WHERE is_active = TRUE")
            .fetch_all(pool)
            .await?;

    TENANTS_GAUGE.set(tenants.len() as f64);

    for slug in &tenants {
        let schema = schema_name(slug);

        let barbers = count(
            pool,
            &format!(r#"SELECT COUNT(*)::BIGINT FROM "{schema}".barbers WHERE is_active = TRUE"#),
        )
        .await;
        BARBERS_GAUGE.with_label_values(&[slug]).set(barbers as f64);

        let services = count(
            pool,
            &format!(r#"SELECT COUNT(*)::BIGINT FROM "{schema}".services WHERE is_active = TRUE"#),
        )
        .await;
        SERVICES_GAUGE.with_label_values(&[slug]).set(services as f64);

        let upcoming = count(
            pool,
            &format!(
                r#"SELECT COUNT(*)::BIGINT FROM "{schema}".bookings
                   WHERE start_at > NOW() AND status IN ('pending', 'confirmed')"#
            ),
        )
        .await;
        UPCOMING_BOOKINGS_GAUGE.with_label_values(&[slug]).set(upcoming as f64);
    }

    info!("Metrics: collected for {} tenant(s)", tenants.len());
    Ok(())
}
