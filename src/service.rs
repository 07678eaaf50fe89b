use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tower::Service;
use tracing::info;

use crate::container::ContainerNo;
use crate::error::ScraperError;
use crate::pool::{SessionManager, SessionPool};
use crate::runner::{run_search, ProgressCallback, ProgressLog, SearchReport};
use crate::traits::Scraper;

/// 一括照会リクエスト
#[derive(Clone, Default)]
pub struct LookupRequest {
    pub containers: Vec<ContainerNo>,
    pub progress: Option<ProgressCallback>,
}

impl fmt::Debug for LookupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupRequest")
            .field("containers", &self.containers)
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}

impl LookupRequest {
    pub fn new(containers: Vec<ContainerNo>) -> Self {
        Self {
            containers,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// tower::Serviceを実装した照会サービス
///
/// ブラウザセッションはプールで共有する。clone しても同じプールを指す。
pub struct LookupService<M: SessionManager> {
    pool: SessionPool<M>,
    acquire_timeout: Duration,
}

impl<M: SessionManager> Clone for LookupService<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            acquire_timeout: self.acquire_timeout,
        }
    }
}

impl<M: SessionManager> fmt::Debug for LookupService<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupService")
            .field("pool", &self.pool)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl<M: SessionManager> LookupService<M> {
    pub fn new(pool: SessionPool<M>, acquire_timeout: Duration) -> Self {
        Self {
            pool,
            acquire_timeout,
        }
    }

    pub fn pool(&self) -> &SessionPool<M> {
        &self.pool
    }
}

impl<M> Service<LookupRequest> for LookupService<M>
where
    M: SessionManager,
    M::Session: Scraper,
{
    type Response = SearchReport;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.pool.is_closed() {
            return Poll::Ready(Err(ScraperError::PoolClosed));
        }
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: LookupRequest) -> Self::Future {
        info!("照会リクエスト受信: {}件", req.containers.len());

        let pool = self.pool.clone();
        let acquire_timeout = self.acquire_timeout;
        Box::pin(async move {
            let progress = ProgressLog::new(req.progress);
            let report = run_search(&pool, &req.containers, acquire_timeout, progress).await?;

            info!(
                "照会完了: rows={}, elapsed={}",
                report.rows.len(),
                report.total_time()
            );
            Ok(report)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etrans::LookupOutcome;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct EchoScraper;

    #[async_trait]
    impl Scraper for EchoScraper {
        async fn initialize(&mut self) -> Result<(), ScraperError> {
            Ok(())
        }

        async fn login(&mut self) -> Result<(), ScraperError> {
            Ok(())
        }

        async fn is_ready(&mut self) -> bool {
            true
        }

        async fn lookup(&mut self, _container: &ContainerNo) -> Result<LookupOutcome, ScraperError> {
            Ok(LookupOutcome::NoData("내역 없음".into()))
        }

        async fn close(&mut self) -> Result<(), ScraperError> {
            Ok(())
        }
    }

    struct EchoManager;

    #[async_trait]
    impl SessionManager for EchoManager {
        type Session = EchoScraper;

        async fn create(&self, _slot: usize) -> Result<EchoScraper, ScraperError> {
            Ok(EchoScraper)
        }

        async fn is_valid(&self, _session: &mut EchoScraper) -> bool {
            true
        }

        async fn teardown(&self, _session: EchoScraper) {}
    }

    fn service() -> LookupService<EchoManager> {
        LookupService::new(SessionPool::new(EchoManager, 2), Duration::from_secs(1))
    }

    #[test]
    fn test_lookup_request_builder() {
        let containers = ContainerNo::parse_list(["CSQU3054383"]);
        let req = LookupRequest::new(containers.clone()).with_progress(Arc::new(|_line: String| {}));

        assert_eq!(req.containers, containers);
        assert!(req.progress.is_some());
        assert!(format!("{:?}", req).contains("has_progress: true"));
    }

    #[tokio::test]
    async fn test_service_call() {
        let req = LookupRequest::new(ContainerNo::parse_list(["CSQU3054383", "MSKU1234565"]));
        let report = service().oneshot(req).await.unwrap();

        assert_eq!(report.rows.len(), 2);
        assert!(report.rows.iter().all(|row| row.seq() == "NODATA"));
        assert!(report.first_moves().is_empty());
    }

    #[tokio::test]
    async fn test_closed_pool_is_not_ready() {
        let svc = service();
        svc.pool().close().await;

        let err = svc
            .oneshot(LookupRequest::new(ContainerNo::parse_list(["CSQU3054383"])))
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::PoolClosed));
    }
}
