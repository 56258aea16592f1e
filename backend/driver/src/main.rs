mod config;
mod delivery;
mod domain;
mod repository;
mod usecase;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use common::bus::ConsumerHandle;
use common::bus::memory::InMemoryEventBus;
use common::bus::nats::NatsEventBus;
use common::events::TOPICS;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::trace::TraceLayer;

use crate::delivery::http::v1::drivers::{get_driver, list_rides, mark_waiting, register_driver};
use crate::repository::postgres::{
    PostgresDriverRepository, PostgresDriverRideRepository, create_pool,
};
use crate::usecase::drivers::DriversUseCase;

pub type DriversService = DriversUseCase<PostgresDriverRepository, PostgresDriverRideRepository>;

pub struct AppState {
    pub drivers_usecase: Arc<DriversService>,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env().context("failed to load config")?;
    let telemetry = common::telemetry::init(config.telemetry().as_ref())?;

    tracing::info!("starting the driver service");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    metrics_process::Collector::default().describe();
    tracing::info!("prometheus metrics initialized");

    tracing::info!(consumer_group = %config.consumer_group, "config loaded");

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("failed to create database pool")?;
    tracing::info!("database pool created");

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("database migrations applied");

    let drivers_usecase = Arc::new(DriversUseCase::new(
        PostgresDriverRepository::new(pool.clone()),
        PostgresDriverRideRepository::new(pool),
    ));

    let subscriptions = delivery::events::subscriptions(Arc::clone(&drivers_usecase));
    let consumers: ConsumerHandle = match async_nats::connect(&config.nats_url).await {
        Ok(client) => {
            tracing::info!(nats_url = %config.nats_url, "connected to NATS");
            let bus = NatsEventBus::new(client);
            bus.provision(&TOPICS).await?;
            bus.start(&config.consumer_group, subscriptions).await?
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                nats_url = %config.nats_url,
                "failed to connect to NATS, no ride or rating events will arrive"
            );
            InMemoryEventBus::new().start(subscriptions)
        }
    };
    tracing::info!(workers = consumers.worker_count(), "event consumers started");

    let shared_state = Arc::new(AppState {
        drivers_usecase,
        metrics_handle,
    });

    let drivers_api = Router::new()
        .route("/api/v1/drivers", post(register_driver))
        .route("/api/v1/drivers/{id}", get(get_driver))
        .route("/api/v1/drivers/{id}/rides", get(list_rides))
        .route(
            "/api/v1/drivers/{driver_id}/rides/{ride_id}/waiting",
            post(mark_waiting),
        );

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .merge(drivers_api)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, "driver service running");
    axum::serve(listener, router)
        .with_graceful_shutdown(common::shutdown::shutdown_signal())
        .await?;

    consumers.shutdown().await;
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
