use async_trait::async_trait;

use crate::container::ContainerNo;
use crate::credentials::Credentials;
use crate::error::ScraperError;
use crate::etrans::LookupOutcome;
use crate::pool::SessionManager;

#[async_trait]
pub trait Scraper: Send {
    /// ブラウザ初期化
    async fn initialize(&mut self) -> Result<(), ScraperError>;

    /// ログインして照会画面まで進む
    async fn login(&mut self) -> Result<(), ScraperError>;

    /// 照会画面にログイン済みで居るか（URL・タイトル・ログイン表示を確認）
    async fn is_ready(&mut self) -> bool;

    /// コンテナ1件を照会
    async fn lookup(&mut self, container: &ContainerNo) -> Result<LookupOutcome, ScraperError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), ScraperError>;

    /// 一括準備（initialize → login）。失敗したらブラウザを閉じる
    async fn prepare(&mut self) -> Result<(), ScraperError> {
        let result = match self.initialize().await {
            Ok(()) => self.login().await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            let _ = self.close().await;
        }
        result
    }
}

/// 実行時にログイン情報を差し替えられるセッション管理（HTTP サーバ用）
pub trait CredentialManager: SessionManager {
    fn credentials(&self) -> Credentials;

    fn has_credentials(&self) -> bool {
        self.credentials().is_complete()
    }

    /// 差し替える。変わった場合 true（呼び出し側でプールを clear する）
    fn set_credentials(&self, credentials: Credentials) -> bool;
}
