/// Purge old and cancelled bookings.
/// Run daily (e.g., via cron job: 0 3 * * * /app/purge-bookings)
///
/// Usage: purge-bookings [--tenant SLUG] [--days N]

use barbershop_api::services::retention::{RetentionService, DEFAULT_RETENTION_DAYS};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

#[derive(Parser)]
#[command(name = "purge-bookings", about = "Purge cancelled and old bookings")]
struct Args {
    /// Tenant slug to purge (optional, all active tenants if not specified)
    #[arg(long)]
    tenant: Option<String>,

    /// Keep bookings that ended within this many days
    #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
    days: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Starting booking purge (retention {} days)", args.days);

    let tenants = match args.tenant {
        Some(slug) => vec![slug],
        None => RetentionService::active_tenants(&pool).await?,
    };

    let mut total = 0;
    for slug in &tenants {
        match RetentionService::purge_tenant(&pool, slug, args.days).await {
            Ok(n) => total += n,
            Err(e) => tracing::error!("Error purging tenant {}: {}", slug, e),
        }
    }

    tracing::info!("Booking purge completed: {} booking(s) across {} tenant(s)", total, tenants.len());
    Ok(())
}
