//! ETRANS (WebSquare) コンテナ移動履歴スクレイパーモジュール

pub mod grid;
mod manager;
mod probe;
mod scraper;
mod scripts;
mod types;

pub use manager::EtransSessionManager;
pub use probe::SessionProbe;
pub use scraper::EtransScraper;
pub use types::{LookupOutcome, MovementRow, GRID_COLUMNS, HEADERS};
