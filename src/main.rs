use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use barbershop_api::{
    config::Config,
    db, routes,
    services::{email::EmailService, metrics, reminder_scheduler},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    db::migrate_all_existing_tenants(&pool).await?;
    info!("Database connected and migrations applied");

    let redis = redis::Client::open(config.redis_url.as_str())?;

    let email = EmailService::new(&config).map(Arc::new);
    if email.is_some() {
        info!("SMTP email service configured");
    } else {
        info!("SMTP not configured, booking emails disabled");
    }

    metrics::start(pool.clone());
    reminder_scheduler::start(pool.clone(), email.clone());

    let state = AppState {
        db: pool,
        redis,
        config: config.clone(),
        email,
    };
    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Barbershop API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
