mod cleanup;
mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use textbin_api::routes::router;
use textbin_api::service::TextService;
use textbin_api::state::{AppState, AppStateInner};
use textbin_db::{Database, SlugGenerator, SystemClock};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "textbin=debug,textbin_api=debug,textbin_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Database::open(&config.db_path, Arc::new(SystemClock))?;
    info!("Database ready at {}", config.db_path.display());

    let service = TextService::new(db, SlugGenerator::from_os_rng(), config.store_timeout);
    let state: AppState = Arc::new(AppStateInner {
        service,
        jwt_secret: config.jwt_secret.clone(),
        environment: config.environment.clone(),
    });

    tokio::spawn(cleanup::run_cleanup_loop(state.clone(), config.cleanup_interval));

    let app = router(state)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!(
        "textbin listening on {} ({} environment)",
        config.addr, config.environment
    );

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    info!("Shutdown signal received, draining connections");
}
