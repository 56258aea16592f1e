mod config;
mod delivery;
mod domain;
mod repository;
mod usecase;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use common::bus::EventPublisher;
use common::bus::memory::InMemoryEventBus;
use common::bus::nats::NatsEventBus;
use common::events::TOPICS;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::trace::TraceLayer;

use crate::delivery::http::v1::ratings::{
    create_rating, driver_average, get_rating, list_driver_ratings, list_passenger_ratings,
    passenger_average, update_rating,
};
use crate::repository::postgres::{PostgresRatingRepository, create_pool};
use crate::usecase::ratings::RatingsUseCase;
use crate::usecase::ride_gate::HttpRideGate;

pub struct AppState {
    pub ratings_usecase:
        RatingsUseCase<PostgresRatingRepository, HttpRideGate, Arc<dyn EventPublisher>>,
    pub metrics_handle: PrometheusHandle,
}

const PUBLISH_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env().context("failed to load config")?;
    let telemetry = common::telemetry::init(config.telemetry().as_ref())?;

    tracing::info!("starting the rating service");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    metrics_process::Collector::default().describe();
    tracing::info!("prometheus metrics initialized");

    tracing::info!(
        ride_service_url = %config.ride_service_url,
        ride_request_timeout_ms = config.ride_request_timeout_ms,
        breaker_failure_threshold = config.breaker_failure_threshold,
        breaker_cooldown_ms = config.breaker_cooldown_ms,
        rating_cache_ttl_secs = config.rating_cache_ttl_secs,
        "config loaded"
    );

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("failed to create database pool")?;
    tracing::info!("database pool created");

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("database migrations applied");

    let (nats, publisher): (Option<(async_nats::Client, NatsEventBus)>, Arc<dyn EventPublisher>) =
        match async_nats::connect(&config.nats_url).await {
            Ok(client) => {
                tracing::info!(nats_url = %config.nats_url, "connected to NATS");
                let bus = NatsEventBus::new(client.clone());
                bus.provision(&TOPICS).await?;
                (Some((client, bus.clone())), Arc::new(bus))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    nats_url = %config.nats_url,
                    "failed to connect to NATS, rating events stay in-process"
                );
                (None, Arc::new(InMemoryEventBus::new()))
            }
        };

    let ride_gate = HttpRideGate::new(
        config.ride_service_url.clone(),
        config.ride_request_timeout(),
        config.breaker(),
    )
    .context("failed to build ride service client")?;

    let ratings_usecase = RatingsUseCase::new(
        PostgresRatingRepository::new(pool),
        ride_gate,
        publisher,
        config.rating_cache_ttl(),
        config.partition_key_strategy,
    );

    let shared_state = Arc::new(AppState {
        ratings_usecase,
        metrics_handle,
    });

    let ratings_api = Router::new()
        .route("/api/v1/ratings", post(create_rating))
        .route("/api/v1/ratings/{id}", get(get_rating).put(update_rating))
        .route("/api/v1/drivers/{id}/ratings", get(list_driver_ratings))
        .route("/api/v1/drivers/{id}/ratings/average", get(driver_average))
        .route("/api/v1/passengers/{id}/ratings", get(list_passenger_ratings))
        .route(
            "/api/v1/passengers/{id}/ratings/average",
            get(passenger_average),
        );

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .merge(ratings_api)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, "rating service running");
    axum::serve(listener, router)
        .with_graceful_shutdown(common::shutdown::shutdown_signal())
        .await?;

    if let Some((client, bus)) = nats {
        bus.drain(PUBLISH_DRAIN_TIMEOUT).await;
        if let Err(e) = client.flush().await {
            tracing::warn!(error = %e, "failed to flush NATS client");
        }
    }
    telemetry.shutdown();

    Ok(())
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    metrics_process::Collector::default().collect();
    state.metrics_handle.render()
}

#[tracing::instrument]
async fn healthz() -> &'static str {
    "OK"
}
