use std::sync::Arc;

use haulway::{AppConfig, AppState, HaulwayError, create_router, telemetry};

#[tokio::main]
async fn main() -> Result<(), HaulwayError> {
    let config = AppConfig::from_env()?;
    telemetry::init_tracing(config.log_format);

    let bind_addr = config.bind_addr.clone();
    let admin_token = config.admin_token.clone();
    let state = Arc::new(AppState::new(config)?);

    if let Some(token) = admin_token {
        let admin = state.user_service.ensure_admin(&token).await?;
        tracing::info!("Bootstrap admin ready: {}", admin.id);
    }

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| HaulwayError::ConfigurationError(format!("cannot bind {}: {}", bind_addr, e)))?;
    tracing::info!("haulway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| HaulwayError::internal_error(format!("server error: {}", e)))?;

    tracing::info!("haulway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
