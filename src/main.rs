use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voxbridge::application::{App, MeetingOrchestrator};
use voxbridge::config::Config;
use voxbridge::infrastructure::translation::{LocalRecognizer, LocalTranslator};
use voxbridge::interface::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::var("VOXBRIDGE_CONFIG") {
        Ok(path) => {
            info!(%path, "Loading configuration");
            Config::from_file(&path)?
        }
        Err(_) => Config::default(),
    };
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let app = App::build(
        config,
        Arc::new(LocalRecognizer::new(Vec::new())),
        Arc::new(LocalTranslator::new()),
    );

    let orchestrator = MeetingOrchestrator::new(
        app.driver.clone(),
        app.meetings.clone(),
        app.attendees.clone(),
        app.launcher.clone(),
    );
    let events = app.meetings.subscribe();
    tokio::spawn(async move { orchestrator.run(events).await });

    let router = build_router(AppState {
        machine: app.machine.clone(),
        driver: app.driver.clone(),
        launcher: app.launcher.clone(),
    });

    info!(%addr, "Starting voice translation bridge");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}
