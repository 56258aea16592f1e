use std::time::Duration;

use common::bus::PartitionKeyStrategy;
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::usecase::circuit_breaker::CircuitBreakerConfig;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
    #[serde(default)]
    pub partition_key_strategy: PartitionKeyStrategy,
    #[serde(default = "default_ride_service_url")]
    pub ride_service_url: String,
    #[serde(default = "default_ride_request_timeout_ms")]
    pub ride_request_timeout_ms: u64,
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,
    #[serde(default = "default_breaker_cooldown_ms")]
    pub breaker_cooldown_ms: u64,
    #[serde(default = "default_rating_cache_ttl_secs")]
    pub rating_cache_ttl_secs: u64,
    #[serde(default)]
    pub telemetry_enabled: bool,
    #[serde(default = "default_telemetry_service_name")]
    pub telemetry_service_name: String,
    #[serde(default = "default_telemetry_service_version")]
    pub telemetry_service_version: String,
    #[serde(default = "default_telemetry_environment")]
    pub telemetry_environment: String,
    #[serde(default = "default_telemetry_otlp_endpoint")]
    pub telemetry_otlp_endpoint: String,
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_http_addr() -> String {
    "0.0.0.0:8083".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_ride_service_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_ride_request_timeout_ms() -> u64 {
    2000
}

fn default_breaker_failure_threshold() -> u32 {
    5
}

fn default_breaker_cooldown_ms() -> u64 {
    30_000
}

fn default_rating_cache_ttl_secs() -> u64 {
    300
}

fn default_telemetry_service_name() -> String {
    "ride-hailing-rating".to_string()
}

fn default_telemetry_service_version() -> String {
    "1.0.0".to_string()
}

fn default_telemetry_environment() -> String {
    "production".to_string()
}

fn default_telemetry_otlp_endpoint() -> String {
    "http://otel-collector.observability.svc.cluster.local:4317".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::default())
            .build()?
            .try_deserialize()
    }

    pub fn telemetry(&self) -> Option<TelemetryConfig> {
        self.telemetry_enabled.then(|| TelemetryConfig {
            service_name: self.telemetry_service_name.clone(),
            service_version: self.telemetry_service_version.clone(),
            environment: self.telemetry_environment.clone(),
            otlp_endpoint: self.telemetry_otlp_endpoint.clone(),
        })
    }

    pub fn ride_request_timeout(&self) -> Duration {
        Duration::from_millis(self.ride_request_timeout_ms)
    }

    pub fn breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold.max(1),
            cooldown: Duration::from_millis(self.breaker_cooldown_ms),
        }
    }

    pub fn rating_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.rating_cache_ttl_secs)
    }
}
