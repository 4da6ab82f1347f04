use scensei_server::{
    app::{self, AppState},
    config::GatewayConfig,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::load()?;
    tracing::info!(
        rp_id = %config.webauthn_rp_id,
        session_mode = ?config.session.mode,
        "Loaded configuration"
    );
    if config.admin_password.is_empty() {
        tracing::warn!("ADMIN_PASSWORD is not set, every gated request will redirect to login");
    }

    let state = Arc::new(AppState::from_config(&config)?);
    let app = app::router(state, &config.site_root);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
