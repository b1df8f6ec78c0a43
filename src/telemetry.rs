use anyhow::{Context, Result};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, Resource};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::AppConfig;

static OTLP_EXPORT_ACTIVE: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub otlp_endpoint: Option<String>,
    pub export_timeout: Duration,
}

impl TelemetryConfig {
    pub fn from_app(app: &AppConfig) -> Self {
        Self {
            service_name: env!("CARGO_PKG_NAME").to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: app.environment.as_str().to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|endpoint| !endpoint.trim().is_empty()),
            export_timeout: Duration::from_secs(30),
        }
    }
}

/// Keeps the exporter alive until shutdown.
pub struct TelemetryHandles {
    exporting: bool,
}

impl TelemetryHandles {
    pub async fn shutdown(self) -> Result<()> {
        if self.exporting {
            info!("Flushing and shutting down trace exporter");
            global::shutdown_tracer_provider();
            OTLP_EXPORT_ACTIVE.store(false, Ordering::Relaxed);
        }
        Ok(())
    }
}

pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryHandles> {
    setup_tracing_subscriber()?;

    info!(
        "Initializing telemetry for service: {} v{} in environment: {}",
        config.service_name, config.service_version, config.environment
    );

    let exporting = match &config.otlp_endpoint {
        Some(endpoint) => {
            init_otlp_tracing(&config, endpoint)?;
            info!(endpoint = %endpoint, "Distributed tracing initialized with OTLP exporter");
            true
        }
        None => {
            info!("No OTLP endpoint configured, using console-only tracing");
            false
        }
    };
    OTLP_EXPORT_ACTIVE.store(exporting, Ordering::Relaxed);

    Ok(TelemetryHandles { exporting })
}

fn init_otlp_tracing(config: &TelemetryConfig, endpoint: &str) -> Result<()> {
    let resource = Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", config.service_version.clone()),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ]);

    let provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_timeout(config.export_timeout),
        )
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_resource(resource)
                .with_sampler(opentelemetry_sdk::trace::Sampler::AlwaysOn),
        )
        .install_batch(runtime::Tokio)
        .context("Failed to initialize OTLP tracer")?;

    global::set_tracer_provider(provider);
    Ok(())
}

fn setup_tracing_subscriber() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{}=debug,tower_http=info", env!("CARGO_CRATE_NAME")).into());

    Registry::default()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TelemetryHealth {
    pub tracing: bool,
    pub otlp_export: bool,
}

pub fn telemetry_health_check() -> TelemetryHealth {
    TelemetryHealth {
        tracing: true,
        otlp_export: OTLP_EXPORT_ACTIVE.load(Ordering::Relaxed),
    }
}
