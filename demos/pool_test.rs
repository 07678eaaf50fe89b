//! セッションプールのログイン・ヘルスチェック確認
//!
//! 実行方法:
//! ```
//! cargo run --example pool_test
//! ```

use std::time::Duration;

use etrans_scraper::{EtransSessionManager, ScraperConfig, SessionPool};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    // .env読み込み
    if let Ok(env_path) = std::fs::canonicalize(".env") {
        println!("Loading .env from: {:?}", env_path);
        for line in std::fs::read_to_string(".env")?.lines() {
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('\'').trim_matches('"');
                if !key.starts_with('#') && !key.is_empty() {
                    std::env::set_var(key, value);
                }
            }
        }
    }

    let user_id = std::env::var("ETRANS_USER_ID").expect("ETRANS_USER_ID not set");
    let password = std::env::var("ETRANS_PASSWORD").expect("ETRANS_PASSWORD not set");

    println!("=== ETRANS Session Pool Test ===");
    let config = ScraperConfig::new(user_id, password).with_headless(true);
    let pool = SessionPool::new(EtransSessionManager::new(config), 2);

    // 全枠ログイン
    let created = pool.warm_up().await;
    println!("Warm up: {} sessions, status={:?}", created, pool.status());

    // 2回借りて、2回目はヘルスチェックだけで返ることを確認
    for round in 1..=2 {
        let started = std::time::Instant::now();
        let session = pool.acquire(Duration::from_secs(60)).await?;
        println!(
            "Round {}: slot={} acquired in {:.2}s",
            round,
            session.slot_id(),
            started.elapsed().as_secs_f64()
        );
        drop(session);
    }

    // 期限切れ扱いで作り直し
    let refreshed = pool.refresh_idle(Duration::ZERO).await;
    println!("Refreshed {} sessions, status={:?}", refreshed, pool.status());

    pool.close().await;
    println!("Closed: status={:?}", pool.status());
    Ok(())
}
