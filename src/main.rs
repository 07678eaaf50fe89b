use etrans_scraper::config::ServerConfig;
use etrans_scraper::credentials::Credentials;
use etrans_scraper::etrans::EtransSessionManager;
use etrans_scraper::pool::SessionPool;
use etrans_scraper::server::{create_app, init_tracing, spawn_keepalive, AppState};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    init_tracing();

    info!("Starting ETRANS scraper service...");

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration loaded: {:?}", config);

    // 保存済みのログイン情報があれば使う
    let manager = EtransSessionManager::new(config.scraper.clone());
    match Credentials::load(&config.credentials_path) {
        Some(saved) if saved.is_complete() => {
            info!("Using saved credentials for user_id={}", saved.user_id);
            manager.set_credentials(saved);
        }
        _ => warn!(
            "No saved credentials at {:?}; waiting for /api/els/login",
            config.credentials_path
        ),
    }

    let pool = SessionPool::new(manager, config.pool.size);
    let keepalive = spawn_keepalive(
        pool.clone(),
        config.keepalive_interval,
        config.session_max_idle,
    );

    let state = AppState::new(
        pool.clone(),
        config.credentials_path.clone(),
        config.pool.acquire_timeout,
    );
    let app = create_app(state);

    let listener = match tokio::net::TcpListener::bind(&config.bind_address()).await {
        Ok(listener) => {
            info!("Server running on http://{}", config.bind_address());
            info!("Health check: GET /health");
            info!("Lookup endpoint: POST /api/els/run");
            listener
        }
        Err(e) => {
            error!("Failed to bind to {}: {}", config.bind_address(), e);
            std::process::exit(1);
        }
    };

    info!("Server starting...");
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("Server error: {}", e);
    } else {
        info!("Server shutdown gracefully");
    }

    // ブラウザを全て閉じる
    pool.close().await;
    keepalive.abort();
}
