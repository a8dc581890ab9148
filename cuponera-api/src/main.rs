use anyhow::Context;
use cuponera_api::{app, AppState, AuthConfig};
use cuponera_core::SystemClock;
use cuponera_store::{Config, DbClient, EventProducer, PostgresCouponRepository, PostgresOfferRepository, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cuponera_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Cuponera API on port {}", config.server.port);
    tracing::info!(
        "Sale window: {:?}, max quantity for uncapped offers: {}",
        config.business_rules.sale_window,
        config.business_rules.max_uncapped_quantity
    );

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let mut app_state = AppState::new(
        Arc::new(PostgresOfferRepository::new(db.pool.clone())),
        Arc::new(PostgresCouponRepository::new(db.pool.clone())),
        Arc::new(SystemClock),
        config.business_rules.clone(),
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    );

    // Redis (rate limiting only; the API runs without it)
    match RedisClient::new(&config.redis.url).await {
        Ok(redis) => app_state = app_state.with_redis(Arc::new(redis)),
        Err(e) => tracing::warn!("Redis unavailable, rate limiting disabled: {}", e),
    }

    // Kafka (best-effort purchase events)
    match EventProducer::new(&config.kafka.brokers) {
        Ok(producer) => app_state = app_state.with_kafka(Arc::new(producer), config.kafka.topic.clone()),
        Err(e) => tracing::warn!("Kafka unavailable, purchase events disabled: {}", e),
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
