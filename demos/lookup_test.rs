//! ETRANS 一括照会テスト
//!
//! 実行方法:
//! ```
//! ETRANS_CONTAINERS=CSQU3054383,MSKU1234565 cargo run --example lookup_test
//! ```

use std::time::Duration;

use etrans_scraper::{
    export, run_search, ContainerNo, EtransSessionManager, ProgressLog, ScraperConfig,
    SessionPool,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // .envがあれば読み込む
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
    let containers = std::env::var("ETRANS_CONTAINERS").expect("ETRANS_CONTAINERS not set");
    let containers = ContainerNo::parse_list(containers.split(','));

    println!("=== ETRANS Lookup Test ===");
    println!("User ID: {}", user_id);
    println!("Containers: {}", containers.len());
    println!("Headless: false (visible browser)");
    println!();

    let config = ScraperConfig::new(user_id, password)
        .with_headless(false)
        .with_debug(true);
    let pool = SessionPool::new(EtransSessionManager::new(config), 2);

    let report = run_search(
        &pool,
        &containers,
        Duration::from_secs(120),
        ProgressLog::new(None),
    )
    .await?;

    println!();
    println!("=== Sheet1 (最新の移動) ===");
    for row in report.first_moves() {
        println!("{}", row.to_cells().join(" | "));
    }
    println!();
    println!("全 {} 行, 所要時間 {}", report.rows.len(), report.total_time());

    let file_name = export::default_file_name();
    std::fs::write(&file_name, export::write_report(&report)?)?;
    println!("Excel保存先: {}", file_name);

    pool.close().await;
    Ok(())
}
