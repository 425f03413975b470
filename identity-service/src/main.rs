use identity_service::{
    build_router,
    config::{AuthConfig, Environment},
    db,
    services::{SmtpEmailService, TracingAuditSink, ROLE_ADMIN, ROLE_EMPLOYEE},
    storage::{IdentityStore, PgStore},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.environment == Environment::Prod,
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    // Database: pool, schema, seed data
    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

    let store: Arc<dyn IdentityStore> = Arc::new(PgStore::new(pool));
    store
        .ensure_system_role(ROLE_ADMIN, "Organization administrator")
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    store
        .ensure_system_role(ROLE_EMPLOYEE, "Organization employee")
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    tracing::info!("Database initialized, system roles seeded");

    let email = Arc::new(
        SmtpEmailService::new(&config.smtp, config.base_url.clone())
            .map_err(AppError::InternalError)?,
    );
    let audit = Arc::new(TracingAuditSink);

    let state = AppState::build(config.clone(), store, email, audit)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?;
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
