use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ScraperError;

/// プールサイズの下限・上限（接続先サイトへの負荷制限）
pub const MIN_POOL_SIZE: usize = 2;
pub const MAX_POOL_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub user_id: String,
    pub password: String,
    pub headless: bool,
    pub debug: bool,
    pub timeout: Duration,
    /// 未指定なら CHROME_PATH / CHROMIUM_PATH を参照
    pub chrome_path: Option<PathBuf>,
    /// メニュー進入失敗時のスクリーンショット保存先
    pub screenshot_dir: PathBuf,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            password: String::new(),
            headless: true,
            debug: false,
            timeout: Duration::from_secs(60),
            chrome_path: None,
            screenshot_dir: PathBuf::from("./debug"),
        }
    }
}

impl ScraperConfig {
    pub fn new(user_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    pub fn has_credentials(&self) -> bool {
        !self.user_id.trim().is_empty() && !self.password.is_empty()
    }

    /// 実行する Chrome のパス
    pub fn resolve_chrome_path(&self) -> Option<PathBuf> {
        self.chrome_path.clone().or_else(|| {
            env::var("CHROME_PATH")
                .or_else(|_| env::var("CHROMIUM_PATH"))
                .ok()
                .map(PathBuf::from)
        })
    }
}

/// セッションプール設定
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub size: usize,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 3,
            acquire_timeout: Duration::from_secs(120),
        }
    }
}

impl PoolConfig {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.clamp(MIN_POOL_SIZE, MAX_POOL_SIZE),
            ..Default::default()
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// HTTPサーバ設定（環境変数から読み込み）
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub credentials_path: PathBuf,
    pub pool: PoolConfig,
    pub scraper: ScraperConfig,
    /// この時間使われていないセッションは再ログインする（ポータル側の期限切れ対策）
    pub session_max_idle: Duration,
    pub keepalive_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2929,
            credentials_path: PathBuf::from("./els_config.json"),
            pool: PoolConfig::default(),
            scraper: ScraperConfig::default(),
            session_max_idle: Duration::from_secs(55 * 60),
            keepalive_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ScraperError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー参照関数から設定を組み立てる
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScraperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "PORT")?.unwrap_or(defaults.port);
        let credentials_path = lookup("ELS_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.credentials_path);

        let mut pool = match parse_var::<usize, _>(&lookup, "ELS_POOL_SIZE")? {
            Some(size) => PoolConfig::new(size),
            None => defaults.pool,
        };
        if let Some(secs) = parse_var::<u64, _>(&lookup, "ELS_ACQUIRE_TIMEOUT_SECS")? {
            pool = pool.with_acquire_timeout(Duration::from_secs(secs));
        }

        let mut scraper = ScraperConfig::default();
        if let Some(headless) = parse_var::<bool, _>(&lookup, "ELS_HEADLESS")? {
            scraper = scraper.with_headless(headless);
        }
        if let Some(debug) = parse_var::<bool, _>(&lookup, "ELS_DEBUG")? {
            scraper = scraper.with_debug(debug);
        }
        if let Some(dir) = lookup("ELS_SCREENSHOT_DIR") {
            scraper = scraper.with_screenshot_dir(dir);
        }

        let session_max_idle = parse_var::<u64, _>(&lookup, "ELS_SESSION_MAX_IDLE_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_max_idle);
        let keepalive_interval = parse_var::<u64, _>(&lookup, "ELS_KEEPALIVE_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.keepalive_interval);

        Ok(Self {
            host,
            port,
            credentials_path,
            pool,
            scraper,
            session_max_idle,
            keepalive_interval,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ScraperError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ScraperError::Config(format!("{} の値が不正です: {}", key, raw))),
        _ => Ok(None),
    }
}
