//! ETRANS スクレイパー実装
//!
//! ログイン → 「컨테이너 이동현황」画面への進入 → コンテナ番号ごとの照会を行う。
//! 1セッション = 1ブラウザ。プールから排他的に貸し出される前提で `&mut self` を取る。

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::HandleJavaScriptDialogParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::container::ContainerNo;
use crate::error::ScraperError;
use crate::traits::Scraper;

use super::grid::{self, NODATA_CONFIRMED};
use super::probe::SessionProbe;
use super::scripts;
use super::types::LookupOutcome;

const LOGIN_URL: &str = "https://etrans.klnet.co.kr/index.do";
const SEARCH_MENU_URL: &str = "https://etrans.klnet.co.kr/main/index.do?menuId=002001007";
const SEARCH_MENU_LABEL: &str = "컨테이너 이동현황";
const PARENT_MENU_LABEL: &str = "통합정보조회";

const LOGIN_FORM_WAIT: Duration = Duration::from_secs(30);
const LOGIN_SETTLE: Duration = Duration::from_secs(7);
const MENU_ATTEMPTS: u32 = 10;
/// この回数まではメニュークリック、以降はURL直接遷移
const MENU_CLICK_ATTEMPTS: u32 = 2;
const SEARCH_SETTLE: Duration = Duration::from_secs(1);
const SCRAPE_ATTEMPTS: u32 = 10;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// ログイン画面に戻されたときの文言
const LOGIN_REPROMPTS: [&str; 2] = ["아이디를 입력", "비밀번호를 입력"];

pub struct EtransScraper {
    config: ScraperConfig,
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
    user_data_dir: Option<PathBuf>,
}

impl EtransScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
            handler_task: None,
            user_data_dir: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.page.is_some()
    }

    fn get_page(&self) -> Result<Page, ScraperError> {
        self.page
            .clone()
            .ok_or_else(|| ScraperError::BrowserInit("ブラウザが初期化されていません".into()))
    }

    /// ページの状態を取得
    pub async fn probe(&self) -> Result<SessionProbe, ScraperError> {
        let page = self.get_page()?;
        let raw: String = evaluate(&page, scripts::PROBE_SESSION).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn close_modals(&self, page: &Page) {
        if let Err(e) = page.evaluate(scripts::CLOSE_MODALS).await {
            debug!("Failed to close modals: {}", e);
        }
    }

    /// alert / confirm が出ていれば了承する
    async fn dismiss_dialog(&self, page: &Page) {
        if page
            .execute(HandleJavaScriptDialogParams::new(true))
            .await
            .is_ok()
        {
            debug!("JavaScript dialog accepted");
        }
    }

    async fn wait_for_login_form(&self, page: &Page) -> Result<(), ScraperError> {
        let start = Instant::now();
        while start.elapsed() < LOGIN_FORM_WAIT {
            match evaluate::<bool>(page, scripts::HAS_LOGIN_FORM).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => debug!("Login form check error: {}", e),
            }
            sleep(POLL_INTERVAL).await;
        }
        Err(ScraperError::Timeout(format!(
            "ログインフォームが{}秒以内に表示されませんでした",
            LOGIN_FORM_WAIT.as_secs()
        )))
    }

    /// 照会画面まで進む（最初はメニュークリック、以降はURL直接遷移）
    async fn open_search_menu(&self, page: &Page) -> Result<(), ScraperError> {
        info!("Opening container movement menu...");

        for attempt in 1..=MENU_ATTEMPTS {
            self.close_modals(page).await;

            match self.probe().await {
                Ok(probe) if probe.has_search_input => {
                    info!("Search page reached (attempt {})", attempt);
                    return Ok(());
                }
                Ok(probe) => debug!(
                    "Menu attempt {}/{} - url={}, title={}",
                    attempt, MENU_ATTEMPTS, probe.url, probe.title
                ),
                Err(e) => debug!("Menu attempt {}/{} probe error: {}", attempt, MENU_ATTEMPTS, e),
            }

            if attempt <= MENU_CLICK_ATTEMPTS {
                let clicked: bool = evaluate(page, &scripts::click_text(SEARCH_MENU_LABEL))
                    .await
                    .unwrap_or(false);
                if clicked {
                    debug!("Menu label clicked");
                    sleep(Duration::from_secs(3)).await;
                } else {
                    let _ = page
                        .evaluate(scripts::click_text(PARENT_MENU_LABEL).as_str())
                        .await;
                    sleep(Duration::from_secs(1)).await;
                }
            } else {
                debug!("Navigating to search menu URL directly");
                page.goto(SEARCH_MENU_URL)
                    .await
                    .map_err(|e| ScraperError::Navigation(e.to_string()))?;
                sleep(Duration::from_secs(4)).await;
            }
        }

        let last_url = page.url().await.ok().flatten().unwrap_or_default();
        self.save_debug_screenshot(page, "menu").await;
        Err(ScraperError::MenuEntry(format!("最終URL: {}", last_url)))
    }

    async fn save_debug_screenshot(&self, page: &Page, name: &str) {
        let screenshot = match page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Failed to take screenshot: {}", e);
                return;
            }
        };

        if self.config.debug {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
            debug!("{} screenshot: data:image/png;base64,{}", name, encoded);
        }

        let dir = &self.config.screenshot_dir;
        let path = dir.join(format!(
            "{}_{}.png",
            name,
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ));
        match std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, &screenshot)) {
            Ok(()) => info!("Saved debug screenshot to {:?}", path),
            Err(e) => warn!("Failed to save debug screenshot: {}", e),
        }
    }

    /// グリッドをポーリングして抽出。None は抽出失敗
    async fn poll_grid(
        &self,
        page: &Page,
        container: &ContainerNo,
    ) -> Result<Option<String>, ScraperError> {
        let script = scripts::scrape_grid(container.as_str());

        for attempt in 1..=SCRAPE_ATTEMPTS {
            match evaluate::<String>(page, &script).await {
                Ok(text) if grid::looks_like_grid(&text) => return Ok(Some(text)),
                Ok(_) => debug!("[{}] grid not ready ({}/{})", container, attempt, SCRAPE_ATTEMPTS),
                Err(e) => debug!("[{}] grid scrape error: {}", container, e),
            }
            sleep(Duration::from_secs(1)).await;
        }

        let html = page
            .content()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        if grid::is_empty_result_page(&html) {
            return Ok(Some(NODATA_CONFIRMED.to_string()));
        }
        Ok(None)
    }
}

#[async_trait]
impl Scraper for EtransScraper {
    async fn initialize(&mut self) -> Result<(), ScraperError> {
        info!("ブラウザを初期化中...");

        // 並列起動時にプロファイルが衝突しないようセッションごとに分ける
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("etrans-{}", unique_id));

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&user_data_dir)
            .window_size(1920, 1080)
            .no_sandbox()
            .request_timeout(self.config.timeout)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--lang=ko-KR");

        if let Some(path) = self.config.resolve_chrome_path() {
            builder = builder.chrome_executable(path);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        if self.config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {:?}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        self.browser = Some(browser);
        self.page = Some(page);
        self.handler_task = Some(handler_task);
        self.user_data_dir = Some(user_data_dir);

        info!("ブラウザ初期化完了");
        Ok(())
    }

    async fn login(&mut self) -> Result<(), ScraperError> {
        if !self.config.has_credentials() {
            return Err(ScraperError::MissingCredentials);
        }
        let page = self.get_page()?;
        info!("ログイン処理開始: user_id={}", self.config.user_id);

        page.goto(LOGIN_URL)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        self.wait_for_login_form(&page).await?;

        page.find_element("#mf_wfm_subContainer_ibx_userId")
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("ユーザーID入力欄: {}", e)))?
            .click()
            .await
            .map_err(|e| ScraperError::Login(format!("ユーザーID入力欄クリック: {}", e)))?
            .type_str(&self.config.user_id)
            .await
            .map_err(|e| ScraperError::Login(format!("ユーザーID入力: {}", e)))?;

        let password_input = page
            .find_element("#mf_wfm_subContainer_sct_password")
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("パスワード入力欄: {}", e)))?;
        password_input
            .click()
            .await
            .map_err(|e| ScraperError::Login(format!("パスワード入力欄クリック: {}", e)))?
            .type_str(&self.config.password)
            .await
            .map_err(|e| ScraperError::Login(format!("パスワード入力: {}", e)))?;
        debug!("認証情報入力完了");

        let clicked: bool = evaluate(&page, scripts::CLICK_LOGIN).await.unwrap_or(false);
        if !clicked {
            debug!("ログインボタンが見つからないためEnterで送信");
            password_input
                .press_key("Enter")
                .await
                .map_err(|e| ScraperError::Login(format!("Enter送信: {}", e)))?;
        }

        sleep(LOGIN_SETTLE).await;
        self.dismiss_dialog(&page).await;
        self.close_modals(&page).await;

        let html = page
            .content()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        if LOGIN_REPROMPTS.iter().any(|msg| html.contains(msg)) {
            return Err(ScraperError::Login("ログイン情報の再入力を求められました".into()));
        }

        self.open_search_menu(&page).await?;
        info!("ログイン完了");
        Ok(())
    }

    async fn is_ready(&mut self) -> bool {
        if !self.is_initialized() {
            return false;
        }
        match self.probe().await {
            Ok(probe) => match probe.problem() {
                None => true,
                Some(problem) => {
                    info!("Session not ready: {} (url={})", problem, probe.url);
                    false
                }
            },
            Err(e) => {
                info!("Session probe failed: {}", e);
                false
            }
        }
    }

    async fn lookup(&mut self, container: &ContainerNo) -> Result<LookupOutcome, ScraperError> {
        let page = self.get_page()?;
        let start = Instant::now();

        self.dismiss_dialog(&page).await;
        self.close_modals(&page).await;
        if !self.probe().await?.has_search_input {
            self.open_search_menu(&page).await?;
        }

        let status: String = evaluate(&page, &scripts::fill_and_search(container.as_str())).await?;
        if status == "INPUT_NOT_FOUND" {
            warn!("[{}] search input not found", container);
            return Ok(LookupOutcome::Failed(status));
        }
        debug!("[{}] search submitted ({})", container, status);

        sleep(SEARCH_SETTLE).await;
        self.dismiss_dialog(&page).await;

        let grid_text = self.poll_grid(&page, container).await?;
        let outcome = grid::outcome_from_grid(container, grid_text.as_deref());
        debug!("[{}] lookup finished in {:?}", container, start.elapsed());
        Ok(outcome)
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("ブラウザを終了中...");

        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!("Failed to close browser: {}", e);
            }
            let _ = browser.wait().await;
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        if let Some(dir) = self.user_data_dir.take() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                debug!("Failed to remove user data dir {:?}: {}", dir, e);
            }
        }

        info!("ブラウザ終了完了");
        Ok(())
    }
}

async fn evaluate<T: DeserializeOwned>(page: &Page, script: &str) -> Result<T, ScraperError> {
    page.evaluate(script)
        .await
        .map_err(|e| ScraperError::JavaScript(e.to_string()))?
        .into_value::<T>()
        .map_err(|e| ScraperError::JavaScript(e.to_string()))
}
