//! ETRANS コンテナ移動履歴スクレイパー
//!
//! - ブラウザセッションのプール（2〜5）でコンテナ番号を並列照会
//! - 照会結果を Excel（Sheet1: 最新の移動 / Sheet2: 全履歴）に出力
//! - `/api/els/*` HTTP サーバ（ストリーミング進捗・ダウンロード）
//!
//! # 照会サービス使用例
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use etrans_scraper::{ContainerNo, EtransSessionManager, LookupRequest, LookupService, ScraperConfig, SessionPool};
//! use tower::ServiceExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = EtransSessionManager::new(ScraperConfig::new("user_id", "password"));
//!     let pool = SessionPool::new(manager, 3);
//!     let service = LookupService::new(pool.clone(), Duration::from_secs(120));
//!
//!     let containers = ContainerNo::parse_list(["CSQU3054383", "MSKU1234565"]);
//!     let report = service.oneshot(LookupRequest::new(containers)).await.unwrap();
//!     println!("rows: {}, time: {}", report.rows.len(), report.total_time());
//!
//!     pool.close().await;
//! }
//! ```
//!
//! # 単体スクレイパー使用例
//!
//! ```rust,ignore
//! use etrans_scraper::{ContainerNo, EtransScraper, Scraper, ScraperConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut scraper = EtransScraper::new(ScraperConfig::new("user_id", "password"));
//!     scraper.prepare().await.unwrap();
//!     let outcome = scraper.lookup(&ContainerNo::parse("CSQU3054383").unwrap()).await.unwrap();
//!     println!("{:?}", outcome);
//!     scraper.close().await.unwrap();
//! }
//! ```

pub mod config;
pub mod container;
pub mod credentials;
pub mod error;
pub mod etrans;
pub mod export;
pub mod pool;
pub mod runner;
pub mod server;
pub mod service;
pub mod traits;

// 主要な型をリエクスポート
pub use config::{PoolConfig, ScraperConfig, ServerConfig};
pub use container::ContainerNo;
pub use credentials::Credentials;
pub use error::ScraperError;
pub use etrans::{EtransScraper, EtransSessionManager, LookupOutcome, MovementRow};
pub use pool::{PoolStatus, PooledSession, SessionManager, SessionPool};
pub use runner::{run_search, ProgressLog, SearchReport};
pub use service::{LookupRequest, LookupService};
pub use traits::{CredentialManager, Scraper};
