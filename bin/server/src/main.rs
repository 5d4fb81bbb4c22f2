use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use varekatalog_auth::OAuthProvider;
use varekatalog_server::{
    auth::{AppState, SessionRegistry},
    config::ServerConfig,
    router,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env()?;
    tracing::info!("Loaded configuration");

    let provider = OAuthProvider::new(config.oauth)
        .map_err(|e| format!("invalid identity provider configuration: {e}"))?;
    tracing::info!(domain = provider.config().domain(), "identity provider ready");

    let sessions = SessionRegistry::new(Arc::new(provider), config.session.manager_settings());
    let app_state = Arc::new(AppState::new(sessions, config.session));

    // Spawn periodic idle-session cleanup task
    let cleanup_state = app_state.clone();
    tokio::spawn(async move {
        let idle = cleanup_state.session_config.idle_timeout();
        let mut interval = tokio::time::interval(cleanup_state.session_config.cleanup_interval());
        loop {
            interval.tick().await;
            let dropped = cleanup_state.sessions.sweep(idle).await;
            if dropped > 0 {
                tracing::debug!(dropped_sessions = dropped, "Periodic session cleanup");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, router(app_state).into_make_service()).await?;
    Ok(())
}
