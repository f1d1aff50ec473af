//! 连接 worker：在独立线程上维持 SSE 长连接
//!
//! 每个 worker 占用一个专属 OS 线程（内部驱动一个 current-thread tokio runtime），
//! 循环执行「连接 -> 读取 -> 失败后等待 -> 重连」，直到取消信号触发。
//!
//! 取消信号触发后，另一个 watchdog 线程会在宽限期之后强制中止当前连接；
//! 这是唯一能唤醒不感知取消的读取（[`CancelMode::ForcedAbort`]）的途径。

mod decode;
mod polling;

use crate::error::SseError;
use crate::logging::{LogLevel, Logger};
use crate::transport::{OpenRequest, Transport};
use decode::Utf8ChunkDecoder;
use futures_util::StreamExt;
use parking_lot::Mutex;
use polling::PollingSlot;
use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::event::DEFAULT_RETRY_MS;

const COMPONENT: &str = "ConnectionWorker";

/// 接收解码后文本片段的回调，在 worker 线程上同步调用
pub type ChunkSink = Box<dyn FnMut(&str) + Send>;

/// 读取与取消的协作方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelMode {
    /// 连接与读取都与取消信号竞争，停止请求立即生效
    #[default]
    Native,
    /// 读取不感知取消，只能由宽限期后的强制中止唤醒
    ForcedAbort,
}

/// 建立连接时遇到配置错误（如非法 URL）的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectFailurePolicy {
    /// 与网络错误一样无限重试
    #[default]
    RetryForever,
    /// 记录错误后结束 worker
    FailFast,
}

/// worker 配置
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// 取消后到强制中止当前连接之间的宽限期
    pub grace_period: Duration,
    pub cancel_mode: CancelMode,
    pub connect_failure_policy: ConnectFailurePolicy,
    /// 服务端没有给出正数 retry 时使用的重连间隔
    pub default_retry: Duration,
    pub thread_name: String,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(500),
            cancel_mode: CancelMode::Native,
            connect_failure_policy: ConnectFailurePolicy::RetryForever,
            default_retry: Duration::from_millis(DEFAULT_RETRY_MS as u64),
            thread_name: "sse-worker".to_string(),
        }
    }
}

impl WorkerOptions {
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn cancel_mode(mut self, mode: CancelMode) -> Self {
        self.cancel_mode = mode;
        self
    }

    pub fn connect_failure_policy(mut self, policy: ConnectFailurePolicy) -> Self {
        self.connect_failure_policy = policy;
        self
    }

    pub fn default_retry(mut self, delay: Duration) -> Self {
        self.default_retry = delay;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Connecting = 1,
    Streaming = 2,
    Retrying = 3,
    Cancelling = 4,
    Terminated = 5,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Streaming,
            3 => Self::Retrying,
            4 => Self::Cancelling,
            _ => Self::Terminated,
        }
    }
}

/// 服务端建议的重连参数，由 worker 的持有者在观察到事件后更新
#[derive(Debug, Default)]
pub struct RetryHint {
    delay_ms: AtomicI64,
    last_event_id: Mutex<Option<String>>,
}

impl RetryHint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_delay_ms(&self, delay_ms: i64) {
        self.delay_ms.store(delay_ms, Ordering::Relaxed);
    }

    pub fn delay_ms(&self) -> i64 {
        self.delay_ms.load(Ordering::Relaxed)
    }

    /// 正数时使用 hint，否则使用 `default`
    pub fn effective_delay(&self, default: Duration) -> Duration {
        match self.delay_ms() {
            ms if ms > 0 => Duration::from_millis(ms as u64),
            _ => default,
        }
    }

    pub fn set_last_event_id(&self, id: impl Into<String>) {
        *self.last_event_id.lock() = Some(id.into());
    }

    pub fn last_event_id(&self) -> Option<String> {
        self.last_event_id.lock().clone()
    }
}

/// worker 线程已启动的信号（不代表连接已建立）
#[derive(Debug, Clone)]
pub struct Readiness {
    rx: watch::Receiver<bool>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待 worker 线程开始运行；线程启动失败时也会返回
    pub async fn wait(mut self) {
        let _ = self.rx.wait_for(|ready| *ready).await;
    }

    pub fn wait_blocking(self) {
        futures::executor::block_on(self.wait())
    }
}

/// 维持一条持久的 SSE 连接，并把收到的文本片段交给 sink。
pub struct ConnectionWorker {
    inner: Arc<Inner>,
    sink: Mutex<Option<ChunkSink>>,
    ready_tx: Mutex<Option<watch::Sender<bool>>>,
    ready_rx: watch::Receiver<bool>,
}

struct Inner {
    url: String,
    cancel: CancellationToken,
    finished: CancellationToken,
    logger: Arc<dyn Logger>,
    transport: Arc<dyn Transport>,
    options: WorkerOptions,
    retry_hint: Arc<RetryHint>,
    slot: PollingSlot,
    state: AtomicU8,
}

impl ConnectionWorker {
    pub fn new(
        url: impl Into<String>,
        cancel: CancellationToken,
        sink: impl FnMut(&str) + Send + 'static,
        logger: Arc<dyn Logger>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_options(
            url,
            cancel,
            sink,
            logger,
            transport,
            WorkerOptions::default(),
            Arc::new(RetryHint::new()),
        )
    }

    pub fn with_options(
        url: impl Into<String>,
        cancel: CancellationToken,
        sink: impl FnMut(&str) + Send + 'static,
        logger: Arc<dyn Logger>,
        transport: Arc<dyn Transport>,
        options: WorkerOptions,
        retry_hint: Arc<RetryHint>,
    ) -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                cancel,
                finished: CancellationToken::new(),
                logger,
                transport,
                options,
                retry_hint,
                slot: PollingSlot::default(),
                state: AtomicU8::new(WorkerState::Idle as u8),
            }),
            sink: Mutex::new(Some(Box::new(sink))),
            ready_tx: Mutex::new(Some(ready_tx)),
            ready_rx,
        }
    }

    /// 启动 worker 线程；重复调用不会再启动新的线程。
    pub fn start(&self) -> Result<Readiness, SseError> {
        let Some(sink) = self.sink.lock().take() else {
            return Ok(self.readiness());
        };
        let ready_tx = self.ready_tx.lock().take();

        let inner = self.inner.clone();
        let spawned = thread::Builder::new()
            .name(self.inner.options.thread_name.clone())
            .spawn(move || {
                if let Some(tx) = ready_tx {
                    tx.send_replace(true);
                }
                inner.run(sink);
            });

        if let Err(e) = spawned {
            self.inner
                .log(LogLevel::Error, "start", format!("Failed to spawn worker thread - {e}"));
            self.inner.finish();
            return Err(SseError::Spawn(e));
        }

        self.spawn_watchdog();
        Ok(self.readiness())
    }

    pub fn readiness(&self) -> Readiness {
        Readiness {
            rx: self.ready_rx.clone(),
        }
    }

    /// 服务端 retry 提示；持有者观察到事件后更新
    pub fn retry_hint(&self) -> &Arc<RetryHint> {
        &self.inner.retry_hint
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// worker 线程是否已经退出
    pub fn is_finished(&self) -> bool {
        self.inner.finished.is_cancelled()
    }

    fn spawn_watchdog(&self) {
        let inner = self.inner.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-watchdog", self.inner.options.thread_name))
            .spawn(move || inner.abort_after_grace_period());

        if let Err(e) = spawned {
            self.inner.log(
                LogLevel::Warning,
                "start",
                format!("Failed to spawn abort watchdog - {e}, blocked reads will not be force-aborted"),
            );
        }
    }
}

/// worker 线程退出（包括 panic）时标记为 Terminated
struct FinishGuard<'a>(&'a Inner);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

impl Inner {
    fn run(&self, mut sink: ChunkSink) {
        let _guard = FinishGuard(self);

        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                self.log(LogLevel::Error, "run", format!("Failed to build worker runtime - {e}"));
                return;
            }
        };

        runtime.block_on(self.poll_until_cancelled(&mut sink));
    }

    async fn poll_until_cancelled(&self, sink: &mut ChunkSink) {
        const METHOD: &str = "poll_until_cancelled";

        while !self.cancel.is_cancelled() {
            let Err(error) = self.poll_once(sink).await else {
                continue;
            };
            if self.cancel.is_cancelled() {
                break;
            }

            if error.is_configuration()
                && self.options.connect_failure_policy == ConnectFailurePolicy::FailFast
            {
                self.log(
                    LogLevel::Error,
                    METHOD,
                    format!("Configuration error for '{}' - {}, giving up.", self.url, error),
                );
                return;
            }

            let delay = self.retry_hint.effective_delay(self.options.default_retry);
            self.log(
                LogLevel::Error,
                METHOD,
                format!(
                    "An error occurs during polling of '{}' - {}, retry in {} ms.",
                    self.url,
                    error,
                    delay.as_millis()
                ),
            );
            self.set_state(WorkerState::Retrying);

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(WorkerState::Cancelling);
    }

    /// 一个完整的连接周期；只有在被取消时返回 `Ok`
    async fn poll_once(&self, sink: &mut ChunkSink) -> Result<(), SseError> {
        const METHOD: &str = "poll_once";

        self.set_state(WorkerState::Connecting);
        self.log(LogLevel::Verbose, METHOD, format!("Get polling context for '{}'", self.url));

        let context = self.slot.publish();
        let last_event_id = self.retry_hint.last_event_id();
        let open = self.transport.open(OpenRequest {
            url: &self.url,
            last_event_id: last_event_id.as_deref(),
        });

        let mut stream = tokio::select! {
            biased;
            _ = context.aborted() => return Err(SseError::Aborted),
            _ = self.native_cancellation() => return Ok(()),
            opened = open => opened?,
        };

        self.set_state(WorkerState::Streaming);
        self.log(
            LogLevel::Verbose,
            METHOD,
            format!("Poll data from '{}' (context #{})", self.url, context.generation()),
        );

        let mut decoder = Utf8ChunkDecoder::default();
        while !self.cancel.is_cancelled() {
            let next = tokio::select! {
                biased;
                _ = context.aborted() => return Err(SseError::Aborted),
                _ = self.native_cancellation() => return Ok(()),
                next = stream.next() => next,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Err(e),
                None => return Err(SseError::StreamEnded),
            };
            // 空读取视为暂时现象，继续读
            if chunk.is_empty() {
                continue;
            }

            let text = decoder.decode(&chunk);
            if !text.is_empty() {
                sink(&text);
            }
        }

        Ok(())
    }

    fn native_cancellation(&self) -> impl Future<Output = ()> + '_ {
        let native = self.options.cancel_mode == CancelMode::Native;
        async move {
            if native {
                self.cancel.cancelled().await
            } else {
                std::future::pending().await
            }
        }
    }

    /// watchdog 线程：取消后等待宽限期，再中止当前连接
    fn abort_after_grace_period(&self) {
        let cancelled = futures::executor::block_on(async {
            let cancel = pin!(self.cancel.cancelled());
            let finished = pin!(self.finished.cancelled());
            matches!(
                futures::future::select(cancel, finished).await,
                futures::future::Either::Left(_)
            )
        });
        if !cancelled {
            return;
        }

        let grace = self.options.grace_period;
        thread::sleep(grace);
        if self.finished.is_cancelled() {
            return;
        }

        self.log(
            LogLevel::Warning,
            "abort_after_grace_period",
            format!("Abort request after timeout of {} milliseconds", grace.as_millis()),
        );
        if let Some(generation) = self.slot.abort_current() {
            self.log(
                LogLevel::Verbose,
                "abort_after_grace_period",
                format!("Aborted polling context #{generation} for '{}'", self.url),
            );
        }
    }

    fn finish(&self) {
        self.set_state(WorkerState::Terminated);
        if !self.finished.is_cancelled() {
            self.finished.cancel();
            self.log(LogLevel::Verbose, "run", format!("Worker for '{}' stopped", self.url));
        }
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn log(&self, level: LogLevel, method: &str, message: impl AsRef<str>) {
        self.logger.write(level, COMPONENT, method, message.as_ref());
    }
}
