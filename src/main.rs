use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::Router;
use memory_backend::config::Config;
use memory_backend::logging::{init_tracing, LogConfig};
use memory_backend::routes::build_router;
use memory_backend::srs::registry::SessionRegistry;
use memory_backend::state::AppState;
use memory_backend::store::Store;
use memory_backend::workers::WorkerManager;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    let _log_guard = init_tracing(&LogConfig::from(&config));
    tracing::info!(sled_path = %config.sled_path, "Starting memory-backend");

    let store = Arc::new(Store::open(&config.sled_path).expect("Failed to open sled database"));
    store.run_migrations().expect("Failed to run migrations");

    let sessions = Arc::new(SessionRegistry::new());
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    if let Some(handle) = spawn_workers(&store, &sessions, &shutdown_tx, &config) {
        // 后台任务 panic 只记日志，HTTP 服务照常运行
        tokio::spawn(async move {
            match handle.await {
                Ok(()) => tracing::info!("Worker manager exited"),
                Err(e) => tracing::error!(error = %e, "Worker task panicked"),
            }
        });
    }

    let state = AppState::new(store.clone(), sessions, &config, shutdown_tx.clone());
    let app = with_http_layers(build_router(state), &config);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    tracing::info!(%addr, "Listening");

    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
    {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    match store.flush() {
        Ok(()) => tracing::info!("Store flushed, shutdown complete"),
        Err(e) => tracing::error!(error = %e, "Failed to flush store before exit"),
    }
}

fn spawn_workers(
    store: &Arc<Store>,
    sessions: &Arc<SessionRegistry>,
    shutdown_tx: &broadcast::Sender<()>,
    config: &Config,
) -> Option<JoinHandle<()>> {
    if !config.worker.is_leader {
        tracing::info!("Not the worker leader; background jobs disabled");
        return None;
    }
    let manager = WorkerManager::new(store.clone(), sessions.clone(), shutdown_tx.subscribe(), config);
    Some(tokio::spawn(async move {
        if let Err(e) = manager.start().await {
            tracing::error!(error = %e, "Worker manager failed");
        }
    }))
}

fn with_http_layers(router: Router, config: &Config) -> Router {
    router
        .layer(cors_layer(&config.cors_origin))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
}

/// `*` allows any origin without credentials; anything else must be a
/// single valid origin.
fn cors_layer(origin: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_methods(Any);

    if origin.trim() == "*" {
        return base.allow_origin(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => base.allow_origin(value),
        Err(e) => panic!("FATAL: invalid CORS_ORIGIN '{origin}': {e}"),
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
