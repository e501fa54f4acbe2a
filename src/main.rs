use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sees_console::cli::{run_command, Cli};
use sees_console::cloud::create_provisioner;
use sees_console::config::Config;
use sees_console::startup::run_startup_checks;
use sees_console::template::TemplateSchema;
use sees_console::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.command.is_some() {
        return run_command(&cli).await;
    }

    tracing::info!("Starting SEES console v{}", env!("CARGO_PKG_VERSION"));

    let db = sees_console::db::init(&config.database).await?;
    let store = sees_console::store::connect(&config.store).await?;
    let templates = TemplateSchema::load(config.template.config_path.as_deref())?;
    let provisioner = create_provisioner(&config.cloud);

    if cli.skip_checks {
        tracing::warn!("Startup checks skipped");
    } else {
        let report = run_startup_checks(&config, &db, store.as_ref(), &templates).await;
        if !report.all_critical_passed {
            anyhow::bail!("Startup checks failed: {}", report.summary);
        }
    }

    let state = Arc::new(AppState::new(
        config.clone(),
        db.clone(),
        store,
        templates,
        provisioner,
    ));

    let app = sees_console::api::create_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Console listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Closing database pool");
    db.close().await;
    tracing::info!(backend = state.store.backend(), "Releasing session store client");
    drop(state);

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
