use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{Resource, trace as sdktrace};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub otlp_endpoint: String,
}

/// Keeps the tracer provider alive; spans still buffered are flushed by
/// [`Telemetry::shutdown`].
pub struct Telemetry {
    provider: Option<sdktrace::SdkTracerProvider>,
}

impl Telemetry {
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to shut down tracer provider: {e}");
            }
        }
    }
}

/// Installs the JSON log subscriber, exporting spans over OTLP when a
/// config is given.
pub fn init(config: Option<&TelemetryConfig>) -> anyhow::Result<Telemetry> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(config) = config else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()?;
        return Ok(Telemetry { provider: None });
    };

    let resource = Resource::builder_empty()
        .with_attribute(KeyValue::new(SERVICE_NAME, config.service_name.clone()))
        .with_attribute(KeyValue::new(SERVICE_VERSION, config.service_version.clone()))
        .with_attribute(KeyValue::new(
            "deployment.environment.name",
            config.environment.clone(),
        ))
        .build();

    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    opentelemetry::global::set_tracer_provider(provider.clone());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .with(OpenTelemetryLayer::new(tracer))
        .try_init()?;

    tracing::info!(
        service = %config.service_name,
        endpoint = %config.otlp_endpoint,
        "OpenTelemetry initialized"
    );

    Ok(Telemetry {
        provider: Some(provider),
    })
}
