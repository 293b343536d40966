use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use memory_backend::config::{Config, StudyConfig, WorkerConfig};
use memory_backend::routes::build_router;
use memory_backend::srs::registry::SessionRegistry;
use memory_backend::state::AppState;
use memory_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

pub async fn spawn_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("memory-test.sled");

    // 直接构造 Config，避免 set_var 在多线程测试中的环境变量竞态
    let config = Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        worker: WorkerConfig { is_leader: false },
        study: StudyConfig::default(),
    };

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let sessions = Arc::new(SessionRegistry::new());
    let state = AppState::new(store, sessions, &config, shutdown_tx);

    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}
