use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::DefaultBodyLimit, Router};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::etrans::EtransSessionManager;
use crate::pool::{SessionManager, SessionPool};
use crate::service::LookupService;
use crate::traits::{CredentialManager, Scraper};

use super::routes::create_routes;
use super::store::FileStore;

/// アップロード上限（照会リスト xlsx）
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// ハンドラ共有の状態
pub struct AppState<M: SessionManager = EtransSessionManager> {
    pub pool: SessionPool<M>,
    pub service: LookupService<M>,
    pub store: Arc<FileStore>,
    pub credentials_path: Arc<PathBuf>,
    pub acquire_timeout: Duration,
}

impl<M: SessionManager> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            service: self.service.clone(),
            store: self.store.clone(),
            credentials_path: self.credentials_path.clone(),
            acquire_timeout: self.acquire_timeout,
        }
    }
}

impl<M: SessionManager> AppState<M> {
    pub fn new(
        pool: SessionPool<M>,
        credentials_path: impl Into<PathBuf>,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            service: LookupService::new(pool.clone(), acquire_timeout),
            pool,
            store: Arc::new(FileStore::default()),
            credentials_path: Arc::new(credentials_path.into()),
            acquire_timeout,
        }
    }
}

/// Initialize tracing and logging for the application
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "etrans_scraper=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Create and configure the Axum application with all routes and middleware
pub fn create_app<M>(state: AppState<M>) -> Router
where
    M: CredentialManager,
    M::Session: Scraper,
{
    info!("Initializing application router");

    Router::new()
        .merge(create_routes::<M>())
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// 待機中セッションを定期的に作り直す（ポータルのセッション期限切れ前に再ログイン）
///
/// プールが閉じられたら終了する。
pub fn spawn_keepalive<M: SessionManager>(
    pool: SessionPool<M>,
    interval: Duration,
    max_idle: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 最初の tick は即時
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if pool.is_closed() {
                debug!("Pool closed, stopping keep-alive");
                break;
            }
            let refreshed = pool.refresh_idle(max_idle).await;
            if refreshed > 0 {
                info!("Keep-alive: re-logged in {} idle sessions", refreshed);
            }
        }
    })
}
