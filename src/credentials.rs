//! 保存済みログイン情報（els_config.json）

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ScraperError;

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_pw: String,
}

// パスワードはログに出さない
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("user_pw", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, user_pw: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into().trim().to_string(),
            user_pw: user_pw.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.user_id.is_empty() && !self.user_pw.is_empty()
    }

    /// ファイルがない・壊れている場合は None
    pub fn load(path: &Path) -> Option<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return None,
        };
        match serde_json::from_str::<Self>(&raw) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                error!("設定ファイル {:?} の形式が不正です: {}", path, e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ScraperError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Saved credentials for user_id={} to {:?}", self.user_id, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("etrans-credentials-{}-{}", std::process::id(), name))
            .join("els_config.json")
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("roundtrip");
        let credentials = Credentials::new(" user ", "secret");
        credentials.save(&path).unwrap();

        let loaded = Credentials::load(&path).unwrap();
        assert_eq!(loaded.user_id, "user");
        assert_eq!(loaded.user_pw, "secret");
        assert!(loaded.is_complete());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_or_malformed_file() {
        let path = temp_path("malformed");
        assert!(Credentials::load(&path).is_none());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(Credentials::load(&path).is_none());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_partial_file_is_incomplete() {
        let credentials: Credentials = serde_json::from_str(r#"{"user_id":"u"}"#).unwrap();
        assert!(!credentials.is_complete());
    }

    #[test]
    fn test_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("user", "secret"));
        assert!(!debug.contains("secret"));
    }
}
