use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use tracing::{debug, info, warn};

use crate::container::ContainerNo;
use crate::credentials::Credentials;
use crate::error::ScraperError;
use crate::export;
use crate::pool::SessionManager;
use crate::runner::{ProgressCallback, ProgressLog};
use crate::service::LookupRequest;
use crate::traits::{CredentialManager, Scraper};

use super::app::AppState;
use super::error::{AppError, AppResult};
use super::models::{
    CapabilitiesResponse, ConfigRequest, ConfigResponse, ConfigSaved, CredentialsInput,
    DownloadQuery, HealthResponse, LoginResponse, OkResponse, ParseResponse, RunRequest,
    RunResult,
};

const ONLY_XLSX: &str = "container_list.xlsx 형식만 지원합니다.";

/// 直列化に失敗したときの RESULT 行
const RESULT_FALLBACK: &str = r#"{"sheet1":[],"sheet2":[],"downloadToken":null,"error":"결과 직렬화 실패","totalTime":null}"#;

/// Health check handler
pub async fn health_check<M>(State(state): State<AppState<M>>) -> Json<HealthResponse>
where
    M: CredentialManager,
    M::Session: Scraper,
{
    debug!("Health check endpoint called");
    Json(HealthResponse {
        status: "ok".to_string(),
        pool: state.pool.status(),
    })
}

pub async fn capabilities() -> Json<CapabilitiesResponse> {
    Json(CapabilitiesResponse {
        available: true,
        parse_available: true,
    })
}

pub async fn get_config<M>(State(state): State<AppState<M>>) -> Json<ConfigResponse>
where
    M: CredentialManager,
    M::Session: Scraper,
{
    let saved = Credentials::load(&state.credentials_path).unwrap_or_default();
    Json(ConfigResponse {
        has_saved: saved.is_complete(),
        default_user_id: saved.user_id,
    })
}

pub async fn save_config<M>(
    State(state): State<AppState<M>>,
    Json(payload): Json<ConfigRequest>,
) -> AppResult<Json<ConfigSaved>>
where
    M: CredentialManager,
    M::Session: Scraper,
{
    let credentials = Credentials::new(
        payload.user_id.unwrap_or_default(),
        payload.user_pw.unwrap_or_default(),
    );
    if !credentials.is_complete() {
        return Err(AppError::BadRequest(
            "아이디와 비밀번호가 필요합니다.".to_string(),
        ));
    }

    credentials.save(&state.credentials_path)?;
    Ok(Json(ConfigSaved {
        success: true,
        default_user_id: credentials.user_id,
    }))
}

/// 保存済み or リクエストのログイン情報（不完全なら None）
fn resolve_credentials<M>(state: &AppState<M>, input: &CredentialsInput) -> Option<Credentials>
where
    M: SessionManager,
{
    let candidate = if input.use_saved_creds {
        Credentials::load(&state.credentials_path)
    } else {
        Some(Credentials::new(
            input.user_id.clone().unwrap_or_default(),
            input.user_pw.clone().unwrap_or_default(),
        ))
    };
    candidate.filter(Credentials::is_complete)
}

/// ログイン情報をセッション管理に反映する。変わったらプールを clear して true
async fn install_credentials<M>(
    state: &AppState<M>,
    input: &CredentialsInput,
) -> Result<bool, ScraperError>
where
    M: CredentialManager,
    M::Session: Scraper,
{
    let manager = state.pool.manager();
    match resolve_credentials(state, input) {
        Some(credentials) => {
            if manager.set_credentials(credentials) {
                state.pool.clear().await;
                return Ok(true);
            }
            Ok(false)
        }
        None if manager.has_credentials() => Ok(false),
        None => Err(ScraperError::MissingCredentials),
    }
}

/// ログイン（セッションを1つ作り直して確認する）
pub async fn login<M>(
    State(state): State<AppState<M>>,
    Json(input): Json<CredentialsInput>,
) -> Response
where
    M: CredentialManager,
    M::Session: Scraper,
{
    let progress = ProgressLog::new(None);
    if input.show_browser.is_some() {
        info!("showBrowser is ignored; browser visibility follows ELS_HEADLESS");
    }

    let cleared = match install_credentials(&state, &input).await {
        Ok(cleared) => cleared,
        Err(e) => {
            progress.log(e.to_string());
            return login_response(StatusCode::BAD_REQUEST, &progress, Some(e.to_string()));
        }
    };
    if !cleared {
        state.pool.clear().await;
    }

    let user_id = state.pool.manager().credentials().user_id;
    progress.log(format!("로그인 시도 중... ({})", user_id));
    match state.pool.acquire(state.acquire_timeout).await {
        Ok(session) => {
            drop(session);
            progress.log("로그인 성공");

            // 残りの枠は裏で埋める
            let pool = state.pool.clone();
            tokio::spawn(async move {
                pool.warm_up().await;
            });
            login_response(StatusCode::OK, &progress, None)
        }
        Err(e) => {
            warn!("Login failed: {}", e);
            progress.log(format!("로그인 실패: {}", e));
            login_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &progress,
                Some(e.to_string()),
            )
        }
    }
}

fn login_response(status: StatusCode, progress: &ProgressLog, error: Option<String>) -> Response {
    let body = LoginResponse {
        ok: error.is_none(),
        log: progress.lines(),
        error,
    };
    (status, Json(body)).into_response()
}

/// 一括照会。`LOG:` 行を流し、最後に `RESULT:` 行を1つ返す
pub async fn run<M>(
    State(state): State<AppState<M>>,
    Json(payload): Json<RunRequest>,
) -> AppResult<Response>
where
    M: CredentialManager,
    M::Session: Scraper,
{
    let containers = ContainerNo::parse_list(&payload.containers);
    if containers.is_empty() {
        return Err(AppError::BadRequest(
            "containers 배열이 필요합니다.".to_string(),
        ));
    }
    info!("Run requested for {} containers", containers.len());

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(run_job(state, payload.credentials, containers, tx));

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|line| (Ok::<_, Infallible>(line), rx))
    });
    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(e.to_string()))
}

async fn run_job<M>(
    state: AppState<M>,
    input: CredentialsInput,
    containers: Vec<ContainerNo>,
    tx: mpsc::UnboundedSender<String>,
) where
    M: CredentialManager,
    M::Session: Scraper,
{
    let result = match execute_run(&state, &input, containers, tx.clone()).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Run failed: {}", e);
            RunResult::failed(e.to_string())
        }
    };

    let json = serde_json::to_string(&result).unwrap_or_else(|_| RESULT_FALLBACK.to_string());
    if tx.send(format!("RESULT:{}\n", json)).is_err() {
        debug!("Client disconnected before result was sent");
    }
}

async fn execute_run<M>(
    state: &AppState<M>,
    input: &CredentialsInput,
    containers: Vec<ContainerNo>,
    tx: mpsc::UnboundedSender<String>,
) -> Result<RunResult, ScraperError>
where
    M: CredentialManager,
    M::Session: Scraper,
{
    install_credentials(state, input).await?;

    let progress: ProgressCallback = Arc::new(move |line: String| {
        let _ = tx.send(format!("LOG:{}\n", line));
    });
    let request = LookupRequest::new(containers).with_progress(progress);
    let report = state.service.clone().oneshot(request).await?;

    let bytes = export::write_report(&report)?;
    let token = state.store.insert(bytes);
    Ok(RunResult::completed(report, token))
}

/// 照会リスト xlsx（multipart の `file`）からコンテナ番号を読む
pub async fn parse_xlsx(mut multipart: Multipart) -> AppResult<Json<ParseResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let is_xlsx = field
            .file_name()
            .map(|name| name.to_lowercase().ends_with(".xlsx"))
            .unwrap_or(false);
        if !is_xlsx {
            return Err(AppError::BadRequest(ONLY_XLSX.to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let containers = export::parse_container_list(&bytes)?;
        info!("Parsed {} containers from upload", containers.len());

        return Ok(Json(ParseResponse {
            containers: containers.into_iter().map(String::from).collect(),
        }));
    }

    Err(AppError::BadRequest(ONLY_XLSX.to_string()))
}

/// 結果ファイルのダウンロード（トークンは1回限り）
pub async fn download<M>(
    State(state): State<AppState<M>>,
    Query(query): Query<DownloadQuery>,
) -> AppResult<Response>
where
    M: CredentialManager,
    M::Session: Scraper,
{
    let token = query
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::BadRequest("token required".to_string()))?;
    let bytes = state
        .store
        .take(&token)
        .ok_or_else(|| AppError::NotFound("파일이 없거나 만료되었습니다.".to_string()))?;

    let file_name = query
        .filename
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(export::default_file_name);
    Ok(xlsx_response(bytes, &file_name))
}

pub async fn logout<M>(State(state): State<AppState<M>>) -> Json<OkResponse>
where
    M: CredentialManager,
    M::Session: Scraper,
{
    state.pool.clear().await;
    Json(OkResponse { ok: true })
}

pub async fn template() -> AppResult<Response> {
    let bytes = export::template()?;
    Ok(xlsx_response(bytes, export::TEMPLATE_FILE_NAME))
}

fn xlsx_response(bytes: Vec<u8>, file_name: &str) -> Response {
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    );
    (
        [
            (header::CONTENT_TYPE, export::XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}
