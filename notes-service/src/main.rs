use crud_kit::auth::TokenEntry;
use crud_kit::store::{MemoryStore, MongoStore};
use crud_kit::{Store, UserBoundEntry};
use notes_service::{
    bootstrap::seed_invitation,
    build_router,
    config::{Backend, NotesConfig},
    models::Note,
};
use service_core::config::ProcessEnvironment;
use service_core::error::AppError;
use service_core::observability::{init_metrics, init_tracing};
use std::net::SocketAddr;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Fail fast on missing sections before anything else starts
    let config = NotesConfig::load()?;

    init_tracing(
        &config.service.service_name,
        &config.service.log_level,
        config.service.otlp_endpoint.as_deref(),
    )?;
    init_metrics()?;

    tracing::info!(
        service = %config.service.service_name,
        backend = ?config.database.backend,
        "Starting notes service"
    );

    match config.database.backend {
        Backend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            serve(MemoryStore::new(), &config).await
        }
        Backend::Mongo => {
            let uri = config.database.connection_string.as_deref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("database.connection_string is not set"))
            })?;
            let store = MongoStore::connect(uri, &config.database.database_name).await?;
            store
                .initialize_owner_index(&config.database.collections.notes, Note::USER_ID_FIELD)
                .await?;
            store
                .initialize_owner_index(&config.database.collections.auth.tokens, TokenEntry::USER_ID_FIELD)
                .await?;
            serve(store, &config).await
        }
    }
}

async fn serve<S: Store>(store: S, config: &NotesConfig) -> Result<(), AppError> {
    store.initialize(&config.database.collections.all()).await?;
    tracing::info!("Database initialized successfully");

    seed_invitation(&store, config, &ProcessEnvironment).await?;

    let app = build_router(store, config, &ProcessEnvironment).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.service.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service.service_name,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
