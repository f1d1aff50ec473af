//! 订阅者管理与事件批次的投递
//!
//! 投递在哪个执行上下文上进行由构造时传入的 [`Dispatcher`] 显式决定：
//! [`InlineDispatcher`] 直接在 worker 线程上调用订阅者，
//! [`TokioDispatcher`] 把通知按顺序转交到调用方指定的 tokio runtime。

use crate::event::EventBatch;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// 一次待执行的投递
pub type Job = Box<dyn FnOnce() + Send>;

/// 投递执行器
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, job: Job);
}

/// 在调用线程（即 worker 线程）上直接执行
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, job: Job) {
        job()
    }
}

/// 把投递转交给指定的 tokio runtime，按提交顺序逐个执行
#[derive(Debug, Clone)]
pub struct TokioDispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

impl TokioDispatcher {
    pub fn new(handle: &tokio::runtime::Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
        });
        Self { tx }
    }

    /// 使用当前线程所在的 runtime；不在 runtime 中时返回 `None`
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(|handle| Self::new(&handle))
    }
}

impl Dispatcher for TokioDispatcher {
    fn dispatch(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!("Dispatcher runtime is gone, event batch dropped");
        }
    }
}

/// 订阅标识，用于取消订阅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&EventBatch) + Send + Sync>;

/// 订阅者列表
///
/// 投递时先在读锁下复制一份快照再逐个调用，
/// 因此回调中注册或取消订阅不会死锁，也不会影响本次投递。
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    entries: RwLock<Vec<(SubscriptionId, Callback)>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, callback));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn notify(&self, batch: &EventBatch) {
        let snapshot: Vec<Callback> = self.entries.read().iter().map(|(_, cb)| cb.clone()).collect();
        for callback in snapshot {
            callback(batch);
        }
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers").field("count", &self.len()).finish()
    }
}
