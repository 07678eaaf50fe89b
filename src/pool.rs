//! ブラウザセッションプール
//!
//! 同時に動かすブラウザ数を固定し、照会1件ごとにセッションを排他的に貸し出す。
//!
//! - `acquire(timeout)`: 空きが出るかタイムアウトまで待つ。貸し出す前にヘルスチェックを行い、
//!   無効なら呼び出し側のタスク内で作り直す（他の呼び出しは止めない）
//! - 返却は `PooledSession` の drop（または `release`）で無条件に行う。失敗後も同じ
//! - 稼働セッション数が減るのは `clear()` / `close()` / `refresh_idle()` のときだけ

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::error::ScraperError;

/// セッションの生成・検査・破棄
#[async_trait]
pub trait SessionManager: Send + Sync + 'static {
    type Session: Send + 'static;

    /// ログイン済みのセッションを作る。`slot` はプール内の枠番号
    async fn create(&self, slot: usize) -> Result<Self::Session, ScraperError>;

    /// 貸し出し前のヘルスチェック
    async fn is_valid(&self, session: &mut Self::Session) -> bool;

    async fn teardown(&self, session: Self::Session);
}

/// 待機中の枠
struct Slot<S> {
    id: usize,
    session: Option<S>,
    generation: u64,
    last_used: Instant,
}

/// 貸し出し中の枠。セッションは必ずある
struct Checkout<S> {
    id: usize,
    generation: u64,
    session: S,
}

impl<S> Checkout<S> {
    fn into_slot(self) -> Slot<S> {
        Slot {
            id: self.id,
            session: Some(self.session),
            generation: self.generation,
            last_used: Instant::now(),
        }
    }
}

struct PoolInner<M: SessionManager> {
    manager: Arc<M>,
    idle: Mutex<VecDeque<Slot<M::Session>>>,
    semaphore: Arc<Semaphore>,
    /// clear() のたびに進める。古い世代のセッションは返却時に破棄
    generation: AtomicU64,
    /// 貸し出し中のセッション数（準備中の枠は含まない）
    checked_out: AtomicUsize,
    size: usize,
}

impl<M: SessionManager> PoolInner<M> {
    fn lock_idle(&self) -> MutexGuard<'_, VecDeque<Slot<M::Session>>> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// 使えるセッションを枠から取り出す（ヘルスチェック → 必要なら破棄して再ログイン）
    async fn ready_session(&self, slot: &mut Slot<M::Session>) -> Result<M::Session, ScraperError> {
        let generation = self.current_generation();

        if let Some(session) = slot.session.as_mut() {
            if slot.generation == generation && self.manager.is_valid(session).await {
                if let Some(session) = slot.session.take() {
                    return Ok(session);
                }
            }
            info!(slot = slot.id, "Session is stale or invalid, re-authenticating");
            if let Some(dead) = slot.session.take() {
                self.manager.teardown(dead).await;
            }
        }

        debug!(slot = slot.id, "Creating session");
        let session = self.manager.create(slot.id).await?;
        slot.generation = generation;
        Ok(session)
    }

    fn put_back(&self, mut slot: Slot<M::Session>, discard: bool) {
        let current = self.current_generation();
        if discard || slot.generation != current {
            if let Some(session) = slot.session.take() {
                self.teardown_detached(session);
            }
            slot.generation = current;
        }
        self.lock_idle().push_back(slot);
    }

    /// drop 中は await できないので破棄はランタイムに任せる
    fn teardown_detached(&self, session: M::Session) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let manager = self.manager.clone();
                handle.spawn(async move {
                    manager.teardown(session).await;
                });
            }
            Err(_) => {
                warn!("No async runtime available, dropping session without teardown");
                drop(session);
            }
        }
    }
}

/// 準備中の枠。失敗・キャンセル時も drop で待機列に戻す
struct PendingSlot<'a, M: SessionManager> {
    slot: Option<Slot<M::Session>>,
    pool: &'a PoolInner<M>,
}

impl<'a, M: SessionManager> PendingSlot<'a, M> {
    fn new(pool: &'a PoolInner<M>, slot: Slot<M::Session>) -> Self {
        Self {
            slot: Some(slot),
            pool,
        }
    }
}

impl<M: SessionManager> Drop for PendingSlot<'_, M> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.put_back(slot, false);
        }
    }
}

/// プールの状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub size: usize,
    pub idle: usize,
    /// 待機列にない枠（貸出中 + 準備中）
    pub in_use: usize,
    /// ログイン済みセッション数（待機中 + 貸出中）
    pub live: usize,
    pub closed: bool,
}

pub struct SessionPool<M: SessionManager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: SessionManager> Clone for SessionPool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: SessionManager> fmt::Debug for SessionPool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPool")
            .field("size", &self.inner.size)
            .finish_non_exhaustive()
    }
}

impl<M: SessionManager> SessionPool<M> {
    /// セッションは最初の貸し出し時（または `warm_up`）に作る
    pub fn new(manager: M, size: usize) -> Self {
        let size = size.max(1);
        let now = Instant::now();
        let idle = (0..size)
            .map(|id| Slot {
                id,
                session: None,
                generation: 0,
                last_used: now,
            })
            .collect();

        Self {
            inner: Arc::new(PoolInner {
                manager: Arc::new(manager),
                idle: Mutex::new(idle),
                semaphore: Arc::new(Semaphore::new(size)),
                generation: AtomicU64::new(0),
                checked_out: AtomicUsize::new(0),
                size,
            }),
        }
    }

    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    pub fn is_closed(&self) -> bool {
        self.inner.semaphore.is_closed()
    }

    /// セッションを借りる
    ///
    /// 空き待ちが `timeout` を超えたら `PoolTimeout`。再ログインの時間は含まない。
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledSession<M>, ScraperError> {
        let permit =
            match tokio::time::timeout(timeout, self.inner.semaphore.clone().acquire_owned()).await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(ScraperError::PoolClosed),
                Err(_) => return Err(ScraperError::PoolTimeout(timeout)),
            };

        // 直近に返却された（ログイン済みの可能性が高い）枠から使う
        let slot = self.inner.lock_idle().pop_back();
        let slot = slot.ok_or(ScraperError::PoolClosed)?;

        let mut pending = PendingSlot::new(&self.inner, slot);
        let (id, session) = match pending.slot.as_mut() {
            Some(slot) => (slot.id, self.inner.ready_session(slot).await?),
            None => return Err(ScraperError::PoolClosed),
        };
        let generation = match pending.slot.take() {
            Some(slot) => slot.generation,
            None => self.inner.current_generation(),
        };

        self.inner.checked_out.fetch_add(1, Ordering::SeqCst);
        Ok(PooledSession {
            checkout: Some(Checkout {
                id,
                generation,
                session,
            }),
            pool: self.inner.clone(),
            discard: false,
            _permit: permit,
        })
    }

    /// 明示的な返却（drop と同じ）
    pub fn release(&self, handle: PooledSession<M>) {
        drop(handle);
    }

    /// 待機中の全セッションを破棄し、貸出中のものは返却時に破棄させる
    pub async fn clear(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let current = self.inner.current_generation();

        let sessions: Vec<M::Session> = {
            let mut idle = self.inner.lock_idle();
            idle.iter_mut()
                .filter_map(|slot| {
                    slot.generation = current;
                    slot.session.take()
                })
                .collect()
        };

        let count = sessions.len();
        for session in sessions {
            self.inner.manager.teardown(session).await;
        }
        info!("Session pool cleared ({} idle sessions closed)", count);
    }

    /// 以降の acquire を失敗させ、セッションを全て閉じる
    pub async fn close(&self) {
        self.inner.semaphore.close();
        self.clear().await;
    }

    /// 待機中の空き枠にセッションを作る。作った数を返す
    ///
    /// ログイン済みの枠には触れない（最終利用時刻を保つ）。
    pub async fn warm_up(&self) -> usize {
        let empty = self
            .inner
            .lock_idle()
            .iter()
            .filter(|slot| slot.session.is_none())
            .count();
        let mut created = 0;

        for _ in 0..empty {
            let Ok(_permit) = self.inner.semaphore.clone().try_acquire_owned() else {
                break;
            };
            let slot = {
                let mut idle = self.inner.lock_idle();
                idle.iter()
                    .position(|slot| slot.session.is_none())
                    .and_then(|index| idle.remove(index))
            };
            let Some(slot) = slot else {
                break;
            };

            let mut pending = PendingSlot::new(&self.inner, slot);
            if let Some(slot) = pending.slot.as_mut() {
                match self.inner.ready_session(slot).await {
                    Ok(session) => {
                        slot.session = Some(session);
                        slot.last_used = Instant::now();
                        created += 1;
                    }
                    Err(e) => warn!(slot = slot.id, "Failed to warm up session: {}", e),
                }
            }
        }

        if created > 0 {
            info!("Warmed up {} sessions", created);
        }
        created
    }

    /// `max_idle` 以上使われていないセッションを作り直す（期限切れ前の再ログイン）
    pub async fn refresh_idle(&self, max_idle: Duration) -> usize {
        let stale: Vec<M::Session> = {
            let mut idle = self.inner.lock_idle();
            idle.iter_mut()
                .filter(|slot| slot.session.is_some() && slot.last_used.elapsed() >= max_idle)
                .filter_map(|slot| slot.session.take())
                .collect()
        };

        if stale.is_empty() {
            return 0;
        }

        let count = stale.len();
        info!("Refreshing {} idle sessions", count);
        for session in stale {
            self.inner.manager.teardown(session).await;
        }
        self.warm_up().await;
        count
    }

    pub fn status(&self) -> PoolStatus {
        let idle = self.inner.lock_idle();
        let idle_live = idle.iter().filter(|slot| slot.session.is_some()).count();
        let checked_out = self.inner.checked_out.load(Ordering::SeqCst);

        PoolStatus {
            size: self.inner.size,
            idle: idle.len(),
            in_use: self.inner.size.saturating_sub(idle.len()),
            live: idle_live + checked_out,
            closed: self.is_closed(),
        }
    }
}

/// 貸し出し中のセッション。drop でプールに戻る
pub struct PooledSession<M: SessionManager> {
    /// 取り出すのは drop のみ
    checkout: Option<Checkout<M::Session>>,
    pool: Arc<PoolInner<M>>,
    discard: bool,
    _permit: OwnedSemaphorePermit,
}

impl<M: SessionManager> PooledSession<M> {
    /// プール内の枠番号
    pub fn slot_id(&self) -> usize {
        self.checkout.as_ref().map(|c| c.id).unwrap_or_default()
    }

    /// 返却時にセッションを破棄させる（枠は残る）
    pub fn discard(&mut self) {
        self.discard = true;
    }

    pub fn release(self) {
        drop(self);
    }
}

impl<M: SessionManager> fmt::Debug for PooledSession<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSession")
            .field("slot", &self.slot_id())
            .field("discard", &self.discard)
            .finish_non_exhaustive()
    }
}

// checkout は drop でしか取り出さないので、生きている間は必ず Some
impl<M: SessionManager> Deref for PooledSession<M> {
    type Target = M::Session;

    fn deref(&self) -> &Self::Target {
        match &self.checkout {
            Some(checkout) => &checkout.session,
            None => unreachable!("checkout is taken only in drop"),
        }
    }
}

impl<M: SessionManager> DerefMut for PooledSession<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.checkout {
            Some(checkout) => &mut checkout.session,
            None => unreachable!("checkout is taken only in drop"),
        }
    }
}

impl<M: SessionManager> Drop for PooledSession<M> {
    fn drop(&mut self) {
        if let Some(checkout) = self.checkout.take() {
            self.pool.checked_out.fetch_sub(1, Ordering::SeqCst);
            self.pool.put_back(checkout.into_slot(), self.discard);
        }
    }
}
