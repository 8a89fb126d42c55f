// Household API - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use household_api::api::{self, AppState};
use household_api::config::Settings;
use household_api::logging::init_logging;
use household_api::{cleanup, db};

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    init_logging(&settings.log_level, settings.log_json);

    tracing::info!(app = %settings.app_name, debug = settings.debug, "starting server");

    let conn = db::open_db(&settings.database_path)?;
    let state = AppState::new(conn, settings.clone())?;

    let _cleanup = cleanup::spawn(state.db.clone(), settings.token_cleanup_interval_secs);

    let app = api::router(state)?;

    let addr = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(%addr, "🚀 server listening");
    println!("\n🚀 Server running on http://{}", addr);
    println!("   Health: http://{}/health", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
