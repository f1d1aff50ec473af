use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct PollingHandle {
    generation: u64,
    abort: CancellationToken,
}

/// 当前 polling context 的共享单元
///
/// 写入方只有 worker 线程（发布/释放），另一方是取消后的 watchdog（中止）。
/// 每个 context 带有递增的 generation；释放按 generation 比较，
/// 旧 context 的释放或中止都是 no-op，不会误伤新连接，也不会重复释放。
#[derive(Debug, Default)]
pub(crate) struct PollingSlot {
    current: Mutex<Option<PollingHandle>>,
    next_generation: AtomicU64,
}

impl PollingSlot {
    /// 发布一个新的 context，替换（而不是修改）之前的
    pub(crate) fn publish(&self) -> PollingContext<'_> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let abort = CancellationToken::new();
        *self.current.lock() = Some(PollingHandle {
            generation,
            abort: abort.clone(),
        });
        PollingContext {
            slot: self,
            generation,
            abort,
        }
    }

    /// 中止当前 context，返回被中止的 generation
    pub(crate) fn abort_current(&self) -> Option<u64> {
        let handle = self.current.lock().clone()?;
        handle.abort.cancel();
        Some(handle.generation)
    }

    #[cfg(test)]
    pub(crate) fn current_generation(&self) -> Option<u64> {
        self.current.lock().as_ref().map(|handle| handle.generation)
    }

    fn release(&self, generation: u64) {
        let mut current = self.current.lock();
        if current.as_ref().map(|handle| handle.generation) == Some(generation) {
            *current = None;
        }
    }
}

/// worker 持有的一次连接周期；drop 时从 slot 中释放
#[derive(Debug)]
pub(crate) struct PollingContext<'a> {
    slot: &'a PollingSlot,
    generation: u64,
    abort: CancellationToken,
}

impl PollingContext<'_> {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// 在 context 被强制中止时完成
    pub(crate) async fn aborted(&self) {
        self.abort.cancelled().await
    }
}

impl Drop for PollingContext<'_> {
    fn drop(&mut self) {
        self.slot.release(self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_replaces_previous_context() {
        let slot = PollingSlot::default();
        let first = slot.publish();
        let second = slot.publish();

        assert_eq!(first.generation() + 1, second.generation());
        assert_eq!(slot.current_generation(), Some(second.generation()));

        // 旧 context 的释放不能清掉新 context
        drop(first);
        assert_eq!(slot.current_generation(), Some(second.generation()));

        drop(second);
        assert_eq!(slot.current_generation(), None);
    }

    #[test]
    fn abort_only_reaches_the_live_context() {
        let slot = PollingSlot::default();
        let old = slot.publish();
        let old_token = old.abort.clone();
        let current = slot.publish();

        assert_eq!(slot.abort_current(), Some(current.generation()));
        assert!(current.abort.is_cancelled());
        assert!(!old_token.is_cancelled());
        drop(old);
    }

    #[test]
    fn abort_after_release_does_nothing() {
        let slot = PollingSlot::default();
        drop(slot.publish());
        assert_eq!(slot.abort_current(), None);
    }

    #[tokio::test]
    async fn abort_current_wakes_the_context() {
        let slot = PollingSlot::default();
        let context = slot.publish();

        assert_eq!(slot.abort_current(), Some(context.generation()));
        tokio::time::timeout(std::time::Duration::from_millis(100), context.aborted())
            .await
            .expect("context should be aborted");
    }
}
