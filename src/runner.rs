//! コンテナ一括照会
//!
//! プールのサイズまで並列に照会し、入力順に結果をまとめる。

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::container::ContainerNo;
use crate::error::ScraperError;
use crate::etrans::{LookupOutcome, MovementRow};
use crate::pool::{SessionManager, SessionPool};
use crate::traits::Scraper;

/// 進捗ログの受け取り先（HTTPストリーミング等）
pub type ProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// 経過時間付きの進捗ログ
#[derive(Clone)]
pub struct ProgressLog {
    started: Instant,
    lines: Arc<Mutex<Vec<String>>>,
    callback: Option<ProgressCallback>,
}

impl fmt::Debug for ProgressLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressLog")
            .field("started", &self.started)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl ProgressLog {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            started: Instant::now(),
            lines: Arc::new(Mutex::new(Vec::new())),
            callback,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// `[HH:MM:SS] [12.3s] message` の形式で記録して通知
    pub fn log(&self, message: impl AsRef<str>) {
        let line = format!(
            "[{}] [{:.1}s] {}",
            chrono::Local::now().format("%H:%M:%S"),
            self.elapsed().as_secs_f64(),
            message.as_ref()
        );
        info!("{}", line);

        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.clone());
        if let Some(callback) = &self.callback {
            callback(line);
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// 一括照会の結果
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    /// 全行（Sheet2）
    pub rows: Vec<MovementRow>,
    pub log: Vec<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl SearchReport {
    /// 最新の移動のみ（Sheet1）
    pub fn first_moves(&self) -> Vec<MovementRow> {
        self.rows
            .iter()
            .filter(|row| row.is_first_move())
            .cloned()
            .collect()
    }

    pub fn total_time(&self) -> String {
        format!("{:.1}s", self.elapsed.as_secs_f64())
    }
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// 1件照会。セッションは成否にかかわらずプールに戻る
async fn lookup_one<M>(
    pool: &SessionPool<M>,
    container: &ContainerNo,
    acquire_timeout: Duration,
    progress: &ProgressLog,
) -> Vec<MovementRow>
where
    M: SessionManager,
    M::Session: Scraper,
{
    let started = Instant::now();
    progress.log(format!("[{}] 분석 중...", container));
    if !container.has_valid_check_digit() {
        warn!("[{}] check digit mismatch, looking up anyway", container);
    }

    let mut session = match pool.acquire(acquire_timeout).await {
        Ok(session) => session,
        Err(e) => {
            progress.log(format!("[{}] 세션 확보 실패: {}", container, e));
            return LookupOutcome::Failed(e.to_string()).into_rows(container);
        }
    };

    let outcome = match session.lookup(container).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if e.is_session_fault() {
                session.discard();
            }
            LookupOutcome::Failed(e.to_string())
        }
    };
    drop(session);

    let secs = started.elapsed().as_secs_f64();
    match &outcome {
        LookupOutcome::Found(rows) => {
            progress.log(format!("[{}] 성공! {}건 [{:.2}s]", container, rows.len(), secs))
        }
        LookupOutcome::NoData(reason) => {
            progress.log(format!("[{}] 내역없음 ({}) [{:.2}s]", container, reason, secs))
        }
        LookupOutcome::Failed(message) => {
            progress.log(format!("[{}] 패스 ({}) [{:.2}s]", container, message, secs))
        }
    }
    outcome.into_rows(container)
}

/// コンテナ一覧を照会する。個別の失敗は ERROR 行として残し、全体は止めない
pub async fn run_search<M>(
    pool: &SessionPool<M>,
    containers: &[ContainerNo],
    acquire_timeout: Duration,
    progress: ProgressLog,
) -> Result<SearchReport, ScraperError>
where
    M: SessionManager,
    M::Session: Scraper,
{
    if pool.is_closed() {
        return Err(ScraperError::PoolClosed);
    }

    progress.log(format!("조회 시작: 총 {}건 처리 중...", containers.len()));

    let mut indexed: Vec<(usize, Vec<MovementRow>)> =
        stream::iter(containers.to_vec().into_iter().enumerate())
            .map(|(index, container)| {
                let pool = pool.clone();
                let progress = progress.clone();
                async move {
                    let rows = lookup_one(&pool, &container, acquire_timeout, &progress).await;
                    (index, rows)
                }
            })
            .buffer_unordered(pool.size())
            .collect()
            .await;
    indexed.sort_by_key(|(index, _)| *index);

    let rows: Vec<MovementRow> = indexed.into_iter().flat_map(|(_, rows)| rows).collect();
    progress.log(format!(
        "모든 조회 완료. (총 소요시간: {:.1}초)",
        progress.elapsed().as_secs_f64()
    ));

    Ok(SearchReport {
        rows,
        log: progress.lines(),
        elapsed: progress.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// コンテナ番号の先頭で結果を決める偽スクレイパー
    struct FakeScraper {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Scraper for FakeScraper {
        async fn initialize(&mut self) -> Result<(), ScraperError> {
            Ok(())
        }

        async fn login(&mut self) -> Result<(), ScraperError> {
            Ok(())
        }

        async fn is_ready(&mut self) -> bool {
            true
        }

        async fn lookup(&mut self, container: &ContainerNo) -> Result<LookupOutcome, ScraperError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let text = match &container.as_str()[..1] {
                "E" => return Err(ScraperError::JavaScript("boom".into())),
                "N" => return Ok(LookupOutcome::NoData("내역 없음".into())),
                _ => "1|수입|반출|HJNC|2024-05-02\n2|수입|반입|HJNC|2024-04-30\n".to_string(),
            };
            Ok(crate::etrans::grid::outcome_from_grid(container, Some(&text)))
        }

        async fn close(&mut self) -> Result<(), ScraperError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeManager {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        torn_down: AtomicUsize,
    }

    #[async_trait]
    impl SessionManager for FakeManager {
        type Session = FakeScraper;

        async fn create(&self, _slot: usize) -> Result<FakeScraper, ScraperError> {
            Ok(FakeScraper {
                in_flight: self.in_flight.clone(),
                max_in_flight: self.max_in_flight.clone(),
            })
        }

        async fn is_valid(&self, _session: &mut FakeScraper) -> bool {
            true
        }

        async fn teardown(&self, _session: FakeScraper) {
            self.torn_down.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn containers(values: &[&str]) -> Vec<ContainerNo> {
        ContainerNo::parse_list(values)
    }

    #[tokio::test]
    async fn test_run_search_keeps_input_order() {
        let pool = SessionPool::new(FakeManager::default(), 2);
        let list = containers(&["AAAU1111111", "NNNU2222222", "BBBU3333333"]);

        let report = run_search(&pool, &list, Duration::from_secs(1), ProgressLog::new(None))
            .await
            .unwrap();

        let query_order: Vec<&str> = report.rows.iter().map(|r| r.query_no.as_str()).collect();
        assert_eq!(
            query_order,
            vec!["AAAU1111111", "AAAU1111111", "NNNU2222222", "BBBU3333333", "BBBU3333333"]
        );
        assert_eq!(report.rows[2].seq(), "NODATA");

        let first: Vec<String> = report.first_moves().into_iter().map(|r| r.query_no).collect();
        assert_eq!(first, vec!["AAAU1111111", "BBBU3333333"]);
    }

    #[tokio::test]
    async fn test_run_search_is_bounded_by_pool_size() {
        let pool = SessionPool::new(FakeManager::default(), 2);
        let list = containers(&[
            "AAAU0000001",
            "AAAU0000002",
            "AAAU0000003",
            "AAAU0000004",
            "AAAU0000005",
        ]);

        run_search(&pool, &list, Duration::from_secs(1), ProgressLog::new(None))
            .await
            .unwrap();
        let max = pool.manager().max_in_flight.load(Ordering::SeqCst);
        assert!(max >= 1 && max <= 2, "max in flight = {}", max);
    }

    #[tokio::test]
    async fn test_failed_lookup_becomes_error_row_and_discards_session() {
        let pool = SessionPool::new(FakeManager::default(), 2);
        let list = containers(&["EEEU1111111", "AAAU2222222"]);

        let report = run_search(&pool, &list, Duration::from_secs(1), ProgressLog::new(None))
            .await
            .unwrap();

        assert_eq!(report.rows[0].seq(), "ERROR");
        assert!(report.rows[0].cells[1].contains("boom"));
        assert_eq!(report.rows[1].seq(), "1");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.manager().torn_down.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_progress_is_forwarded() {
        let pool = SessionPool::new(FakeManager::default(), 2);
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let callback: ProgressCallback = {
            let seen = seen.clone();
            Arc::new(move |line: String| seen.lock().unwrap().push(line))
        };

        let report = run_search(
            &pool,
            &containers(&["AAAU1111111"]),
            Duration::from_secs(1),
            ProgressLog::new(Some(callback)),
        )
        .await
        .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, report.log);
        assert!(seen.first().unwrap().contains("총 1건"));
        assert!(seen.iter().any(|line| line.contains("성공!")));
        assert!(seen.iter().all(|line| line.starts_with('[')));
    }

    #[tokio::test]
    async fn test_closed_pool_is_rejected() {
        let pool = SessionPool::new(FakeManager::default(), 2);
        pool.close().await;
        let err = run_search(
            &pool,
            &containers(&["AAAU1111111"]),
            Duration::from_secs(1),
            ProgressLog::new(None),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScraperError::PoolClosed));
    }
}
