use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("ログインエラー: {0}")]
    Login(String),

    #[error("メニュー進入エラー: {0}")]
    MenuEntry(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Excelエラー: {0}")]
    Excel(String),

    #[error("コンテナ番号が不正です: {0:?}")]
    InvalidContainer(String),

    #[error("アイディ/パスワードがありません")]
    MissingCredentials,

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("セッション取得タイムアウト ({0:?})")]
    PoolTimeout(Duration),

    #[error("セッションプールは閉じられています")]
    PoolClosed,
}

impl ScraperError {
    /// セッションを作り直せば回復する可能性があるエラーか
    pub fn is_session_fault(&self) -> bool {
        matches!(
            self,
            ScraperError::BrowserInit(_)
                | ScraperError::Navigation(_)
                | ScraperError::JavaScript(_)
                | ScraperError::MenuEntry(_)
        )
    }
}

impl From<rust_xlsxwriter::XlsxError> for ScraperError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        ScraperError::Excel(e.to_string())
    }
}

impl From<calamine::XlsxError> for ScraperError {
    fn from(e: calamine::XlsxError) -> Self {
        ScraperError::Excel(e.to_string())
    }
}
