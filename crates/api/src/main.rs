use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webopt_api::config::ServerConfig;
use webopt_api::router::build_app_router;
use webopt_api::state::AppState;
use webopt_pipeline::{
    select_backend, AccountSeed, BatchOrchestrator, ConversionEngine, LocalStorage, QuotaLedger,
    StorageProvider,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webopt_api=debug,webopt_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Codec backend ---
    let backend = select_backend(config.codec_backend).expect("No usable codec backend");
    tracing::info!(backend = backend.name(), "Codec backend selected");

    // --- Storage ---
    tokio::fs::create_dir_all(&config.storage_root)
        .await
        .expect("Failed to create storage root");
    let storage: Arc<dyn StorageProvider> = Arc::new(LocalStorage::new(&config.storage_root));
    tracing::info!(root = %config.storage_root, "Local storage ready");

    // --- Database ---
    let pool = webopt_db::create_pool();

    // --- Event bus ---
    let event_bus = Arc::new(webopt_events::EventBus::default());
    let logger_handle = tokio::spawn(webopt_events::EventLogger::run(event_bus.subscribe()));
    tracing::info!("Event bus created, event logger started");

    // --- Quota ledger ---
    let ledger = Arc::new(QuotaLedger::new(
        Arc::clone(&pool),
        config.pipeline.quota.clone(),
    ));
    if let Some(path) = &config.accounts_file {
        let raw = tokio::fs::read_to_string(path)
            .await
            .unwrap_or_else(|e| panic!("Failed to read ACCOUNTS_FILE '{path}': {e}"));
        let seeds: Vec<AccountSeed> = serde_json::from_str(&raw)
            .unwrap_or_else(|e| panic!("ACCOUNTS_FILE '{path}' is not valid JSON: {e}"));
        let seeded = ledger
            .seed_accounts(seeds)
            .await
            .expect("Failed to register seeded accounts");
        tracing::info!(accounts = seeded, "Quota accounts registered");
    }

    // --- Orchestrator ---
    let engine = Arc::new(ConversionEngine::new(backend, storage));
    let orchestrator = Arc::new(BatchOrchestrator::new(
        pool,
        engine,
        ledger,
        Arc::clone(&event_bus),
        Arc::new(config.pipeline.clone()),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
        event_bus: Arc::clone(&event_bus),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Let in-flight batches finish so no image is left in `processing`.
    let drain = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        orchestrator.drain(),
    )
    .await;
    if drain.is_err() {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Timed out waiting for in-flight batches"
        );
    } else {
        tracing::info!("In-flight batches drained");
    }

    // Drop every bus handle to close the broadcast channel; the logger then
    // exits on its own.
    drop(orchestrator);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;
    tracing::info!("Event logger shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
