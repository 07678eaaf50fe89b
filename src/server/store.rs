//! ダウンロード用の一時ファイル置き場（メモリ上）

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

/// トークンの有効期限
pub const DOWNLOAD_TTL: Duration = Duration::from_secs(30 * 60);

struct StoredFile {
    bytes: Vec<u8>,
    created: Instant,
}

/// トークン → xlsx。取り出しは1回限り
pub struct FileStore {
    files: Mutex<HashMap<String, StoredFile>>,
    ttl: Duration,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(DOWNLOAD_TTL)
    }
}

impl FileStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredFile>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 保存してトークン（16桁の16進）を返す
    pub fn insert(&self, bytes: Vec<u8>) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string()[..16].to_string();
        let mut files = self.lock();

        let ttl = self.ttl;
        files.retain(|_, file| file.created.elapsed() < ttl);
        files.insert(
            token.clone(),
            StoredFile {
                bytes,
                created: Instant::now(),
            },
        );
        debug!("Stored download {} ({} pending)", token, files.len());
        token
    }

    /// 取り出す（以後そのトークンは無効）。期限切れは None
    pub fn take(&self, token: &str) -> Option<Vec<u8>> {
        let file = self.lock().remove(token)?;
        if file.created.elapsed() >= self.ttl {
            return None;
        }
        Some(file.bytes)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
