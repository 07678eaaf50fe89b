use serde::{Deserialize, Serialize};

use crate::etrans::MovementRow;
use crate::pool::PoolStatus;
use crate::runner::SearchReport;

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub pool: PoolStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesResponse {
    pub available: bool,
    pub parse_available: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub has_saved: bool,
    pub default_user_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_pw: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSaved {
    pub success: bool,
    pub default_user_id: String,
}

/// ログイン情報の指定（login / run 共通）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsInput {
    #[serde(default = "default_true")]
    pub use_saved_creds: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_pw: Option<String>,
    /// 受け付けるが使わない（表示/非表示は ELS_HEADLESS で決まる）
    #[serde(default)]
    pub show_browser: Option<bool>,
}

impl Default for CredentialsInput {
    fn default() -> Self {
        Self {
            use_saved_creds: true,
            user_id: None,
            user_pw: None,
            show_browser: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub log: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub containers: Vec<String>,
    #[serde(flatten)]
    pub credentials: CredentialsInput,
}

/// `/run` のストリーム末尾の `RESULT:` 行
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub sheet1: Vec<MovementRow>,
    pub sheet2: Vec<MovementRow>,
    pub download_token: Option<String>,
    pub error: Option<String>,
    pub total_time: Option<String>,
}

impl RunResult {
    pub fn completed(report: SearchReport, download_token: String) -> Self {
        Self {
            sheet1: report.first_moves(),
            total_time: Some(report.total_time()),
            sheet2: report.rows,
            download_token: Some(download_token),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            sheet1: Vec::new(),
            sheet2: Vec::new(),
            download_token: None,
            error: Some(error.into()),
            total_time: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub containers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub token: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_request_defaults_to_saved_credentials() {
        let req: RunRequest = serde_json::from_str(r#"{"containers":["CSQU3054383"]}"#).unwrap();
        assert_eq!(req.containers, vec!["CSQU3054383"]);
        assert!(req.credentials.use_saved_creds);
        assert!(req.credentials.user_id.is_none());

        let req: RunRequest = serde_json::from_str(
            r#"{"containers":[],"useSavedCreds":false,"userId":"u","userPw":"p"}"#,
        )
        .unwrap();
        assert!(!req.credentials.use_saved_creds);
        assert_eq!(req.credentials.user_pw.as_deref(), Some("p"));
    }

    #[test]
    fn test_login_request_accepts_show_browser() {
        let input: CredentialsInput =
            serde_json::from_str(r#"{"useSavedCreds":true,"showBrowser":true}"#).unwrap();
        assert!(input.use_saved_creds);
        assert_eq!(input.show_browser, Some(true));
    }

    #[test]
    fn test_failed_result_json() {
        let json = serde_json::to_value(RunResult::failed("boom")).unwrap();
        assert_eq!(json["error"], "boom");
        assert!(json["downloadToken"].is_null());
        assert_eq!(json["sheet1"].as_array().unwrap().len(), 0);
    }
}
