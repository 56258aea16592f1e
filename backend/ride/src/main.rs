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
    routing::{get, patch, post},
};
use common::bus::memory::InMemoryEventBus;
use common::bus::nats::NatsEventBus;
use common::bus::EventPublisher;
use common::events::TOPICS;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::trace::TraceLayer;

use crate::delivery::http::v1::rides::{
    change_status, create_ride, delete_ride, get_ride, list_driver_rides, list_passenger_rides,
};
use crate::repository::postgres::{PostgresRideRepository, create_pool};
use crate::usecase::rides::RidesUseCase;

pub struct AppState {
    pub rides_usecase: RidesUseCase<PostgresRideRepository, Arc<dyn EventPublisher>>,
    pub metrics_handle: PrometheusHandle,
}

const PUBLISH_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env().context("failed to load config")?;
    let telemetry = common::telemetry::init(config.telemetry().as_ref())?;

    tracing::info!("starting the ride service");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    metrics_process::Collector::default().describe();
    tracing::info!("prometheus metrics initialized");

    tracing::info!(
        telemetry_enabled = config.telemetry_enabled,
        partition_key_strategy = ?config.partition_key_strategy,
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
                    "failed to connect to NATS, ride events stay in-process"
                );
                (None, Arc::new(InMemoryEventBus::new()))
            }
        };

    let rides_usecase = RidesUseCase::new(
        PostgresRideRepository::new(pool),
        publisher,
        config.partition_key_strategy,
    );

    let shared_state = Arc::new(AppState {
        rides_usecase,
        metrics_handle,
    });

    let rides_api = Router::new()
        .route("/api/v1/rides", post(create_ride))
        .route("/api/v1/rides/{id}", get(get_ride).delete(delete_ride))
        .route("/api/v1/rides/{id}/status", patch(change_status))
        .route("/api/v1/passengers/{id}/rides", get(list_passenger_rides))
        .route("/api/v1/drivers/{id}/rides", get(list_driver_rides));

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .merge(rides_api)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, "ride service running");
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
