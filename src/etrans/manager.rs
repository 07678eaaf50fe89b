//! プール用の ETRANS セッション管理

use std::sync::{RwLock, RwLockReadGuard};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::credentials::Credentials;
use crate::error::ScraperError;
use crate::pool::SessionManager;
use crate::traits::{CredentialManager, Scraper};

use super::scraper::EtransScraper;

/// ログイン情報を保持し、ログイン済みの `EtransScraper` を作る
pub struct EtransSessionManager {
    base_config: ScraperConfig,
    credentials: RwLock<Credentials>,
}

impl EtransSessionManager {
    pub fn new(base_config: ScraperConfig) -> Self {
        let credentials = Credentials::new(&base_config.user_id, &base_config.password);
        Self {
            base_config,
            credentials: RwLock::new(credentials),
        }
    }

    fn read_credentials(&self) -> RwLockReadGuard<'_, Credentials> {
        self.credentials.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn credentials(&self) -> Credentials {
        self.read_credentials().clone()
    }

    pub fn has_credentials(&self) -> bool {
        self.read_credentials().is_complete()
    }

    /// ログイン情報を差し替える。変わった場合 true（呼び出し側でプールを clear する）
    pub fn set_credentials(&self, credentials: Credentials) -> bool {
        let mut current = self.credentials.write().unwrap_or_else(|e| e.into_inner());
        if *current == credentials {
            return false;
        }
        info!("Credentials updated: user_id={}", credentials.user_id);
        *current = credentials;
        true
    }

    /// 現在のログイン情報を反映したスクレイパー設定
    pub fn scraper_config(&self) -> ScraperConfig {
        let credentials = self.read_credentials();
        let mut config = self.base_config.clone();
        config.user_id = credentials.user_id.clone();
        config.password = credentials.user_pw.clone();
        config
    }
}

#[async_trait]
impl SessionManager for EtransSessionManager {
    type Session = EtransScraper;

    async fn create(&self, slot: usize) -> Result<EtransScraper, ScraperError> {
        let config = self.scraper_config();
        if !config.has_credentials() {
            return Err(ScraperError::MissingCredentials);
        }

        info!(slot, "Logging in new ETRANS session");
        let mut scraper = EtransScraper::new(config);
        scraper.prepare().await?;
        Ok(scraper)
    }

    async fn is_valid(&self, session: &mut EtransScraper) -> bool {
        session.is_ready().await
    }

    async fn teardown(&self, mut session: EtransScraper) {
        debug!("Tearing down ETRANS session");
        if let Err(e) = session.close().await {
            warn!("Failed to close session: {}", e);
        }
    }
}

impl CredentialManager for EtransSessionManager {
    fn credentials(&self) -> Credentials {
        EtransSessionManager::credentials(self)
    }

    fn has_credentials(&self) -> bool {
        EtransSessionManager::has_credentials(self)
    }

    fn set_credentials(&self, credentials: Credentials) -> bool {
        EtransSessionManager::set_credentials(self, credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_credentials_reports_change() {
        let manager = EtransSessionManager::new(ScraperConfig::default());
        assert!(!manager.has_credentials());

        assert!(manager.set_credentials(Credentials::new("user", "pw")));
        assert!(!manager.set_credentials(Credentials::new("user", "pw")));
        assert!(manager.has_credentials());

        let config = manager.scraper_config();
        assert_eq!(config.user_id, "user");
        assert_eq!(config.password, "pw");
    }

    #[tokio::test]
    async fn test_create_without_credentials_fails_fast() {
        let manager = EtransSessionManager::new(ScraperConfig::default());
        let err = manager.create(0).await.err().unwrap();
        assert!(matches!(err, ScraperError::MissingCredentials));
    }
}
