use tokio::net::TcpListener;
use tracing::{error, info};

use trailshare::{AppState, Config, build_router, database, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let config = Config::from_env().inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    let db = database::connect_and_migrate(&config.database_url).await?;

    let addr = config.bind_addr;
    let app = build_router(AppState::new(db, config));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Trailshare listening, API docs at /docs");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
