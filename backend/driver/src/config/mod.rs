use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
    /// Durable consumer name prefix; instances sharing it split the partitions.
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,
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
    "0.0.0.0:8081".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_consumer_group() -> String {
    "driver-service".to_string()
}

fn default_telemetry_service_name() -> String {
    "ride-hailing-driver".to_string()
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
}
