use rental_yield_engine::{
    auth::RoleRegistry,
    config::Settings,
    services::{
        load_snapshot, AuditSeverity, EventCounter, FanoutSink, MonitoringService,
        PriceOracleAdapter, TracingEventSink, YieldEngine,
    },
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    if settings.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting Rental Yield Engine");

    let access = Arc::new(RoleRegistry::from_lists(
        &settings.engine.admins,
        &settings.engine.operators,
    ));
    let oracle = PriceOracleAdapter::from_settings(&settings.oracle)?;

    let snapshot_path = settings.persistence.snapshot_path.as_ref().map(PathBuf::from);
    let snapshot = match &snapshot_path {
        Some(path) => load_snapshot(path).await?,
        None => None,
    };
    let engine = match snapshot {
        Some(snapshot) => YieldEngine::restore(snapshot, oracle, access)?,
        None => YieldEngine::new(settings.thresholds(), oracle, access)?,
    };

    let counter = Arc::new(EventCounter::new());
    let engine = engine.with_event_sink(Arc::new(
        FanoutSink::new()
            .with(Arc::new(TracingEventSink))
            .with(counter.clone()),
    ));

    // Start monitoring service in background
    let monitoring_handle = {
        let monitoring_service = MonitoringService::new(engine.clone(), &settings);
        tokio::spawn(async move {
            if let Err(e) = monitoring_service.start_monitoring().await {
                error!("Monitoring service failed: {}", e);
            }
        })
    };

    info!("Rental Yield Engine started successfully");

    tokio::select! {
        _ = monitoring_handle => {
            error!("Monitoring service stopped unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    match &snapshot_path {
        Some(path) => engine.save_snapshot(path).await?,
        None => warn!("No snapshot path configured, state discarded"),
    }
    info!(
        "Shutting down Rental Yield Engine after {} events ({} critical)",
        counter.total(),
        counter.count(AuditSeverity::Critical)
    );
    Ok(())
}
