//! Serve command - Starts the HTTP server.

use std::sync::Arc;

use crate::api::{create_router, AppState};
use crate::cli::args::ServeArgs;
use crate::config::{Config, SessionBackend, UserBackend};
use crate::errors::{AppError, AppResult};
use crate::infra::{
    Cache, Database, DatabaseUserStore, InMemorySessionRegistry, RedisSessionRegistry,
    SessionRegistry, UserRepository, UserStore,
};
use crate::jobs::SessionSweeper;
use crate::utils::{Clock, SystemClock};

/// Execute the serve command
pub async fn execute(args: ServeArgs, mut config: Config) -> AppResult<()> {
    tracing::info!("Starting server...");

    if let Some(host) = args.host {
        config.server_host = host;
    }
    if let Some(port) = args.port {
        config.server_port = port;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let sessions: Arc<dyn SessionRegistry> = match config.session_backend {
        SessionBackend::Memory => {
            tracing::info!("Using in-memory session registry");
            Arc::new(InMemorySessionRegistry::new(clock.clone()))
        }
        SessionBackend::Redis => {
            let cache = Cache::connect(&config.redis_url).await?;
            tracing::info!("Using Redis session registry");
            Arc::new(RedisSessionRegistry::new(cache, clock.clone()))
        }
    };
    let users: Arc<dyn UserRepository> = match config.user_backend {
        UserBackend::Memory => {
            tracing::warn!("Using in-memory user store, accounts are lost on restart");
            Arc::new(UserStore::new(clock.clone()))
        }
        UserBackend::Database => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| AppError::internal("DATABASE_URL is not set"))?;
            let db = Database::connect(url).await?;
            tracing::info!("Using database user store");
            Arc::new(DatabaseUserStore::new(db.connection().clone(), clock.clone()))
        }
    };

    let app_state = AppState::from_config(&config, users, sessions.clone(), clock)?;

    if let Some(admin) = config.bootstrap_admin.clone() {
        app_state.auth_service.ensure_admin(admin).await?;
    }

    let sweeper = config
        .sweep_interval
        .map(|interval| SessionSweeper::spawn(sessions, config.store_policy.clone(), interval));

    // Build router
    let app = create_router(app_state);

    // Start server
    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    if let Some(sweeper) = sweeper {
        sweeper.stop().await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
}
