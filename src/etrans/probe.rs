//! セッション状態の判定

use serde::Deserialize;

/// ポータルのホスト
pub const PORTAL_HOST: &str = "etrans.klnet.co.kr";

/// ページの状態（`scripts::PROBE_SESSION` の戻り値）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProbe {
    pub url: String,
    pub title: String,
    pub login_form: bool,
    pub has_search_input: bool,
    pub expired: bool,
}

impl SessionProbe {
    /// 照会画面にログイン済みで居るか
    pub fn is_ready(&self) -> bool {
        self.problem().is_none()
    }

    /// 使えない理由（ログ用）
    pub fn problem(&self) -> Option<&'static str> {
        if !self.url.contains(PORTAL_HOST) {
            Some("portal host not loaded")
        } else if self.login_form {
            Some("login form shown")
        } else if self.expired {
            Some("session expired")
        } else if !self.has_search_input {
            Some("search input missing")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> SessionProbe {
        SessionProbe {
            url: "https://etrans.klnet.co.kr/main/index.do?menuId=002001007".into(),
            title: "ETRANS".into(),
            login_form: false,
            has_search_input: true,
            expired: false,
        }
    }

    #[test]
    fn test_ready_session() {
        assert!(ready().is_ready());
    }

    #[test]
    fn test_unready_sessions() {
        let blank = SessionProbe {
            url: "about:blank".into(),
            ..ready()
        };
        assert_eq!(blank.problem(), Some("portal host not loaded"));

        let login = SessionProbe {
            login_form: true,
            ..ready()
        };
        assert_eq!(login.problem(), Some("login form shown"));

        let expired = SessionProbe {
            expired: true,
            ..ready()
        };
        assert!(!expired.is_ready());

        let elsewhere = SessionProbe {
            has_search_input: false,
            ..ready()
        };
        assert_eq!(elsewhere.problem(), Some("search input missing"));
    }

    #[test]
    fn test_deserialize_script_output() {
        let json = r#"{"url":"https://etrans.klnet.co.kr/index.do","title":"t","loginForm":true,"hasSearchInput":false,"expired":false}"#;
        let probe: SessionProbe = serde_json::from_str(json).unwrap();
        assert!(probe.login_form);
        assert!(!probe.is_ready());
    }
}
