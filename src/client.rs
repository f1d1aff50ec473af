use crate::dispatch::{Dispatcher, InlineDispatcher, SubscriptionId, Subscribers};
use crate::error::SseError;
use crate::event::{EventBatch, SseEvent};
use crate::logging::{LogLevel, Logger};
use crate::parser::FrameAssembler;
use crate::transport::Transport;
use crate::worker::{CancelMode, ConnectFailurePolicy, ConnectionWorker, Readiness, RetryHint, WorkerOptions};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const COMPONENT: &str = "SseClient";

/// 客户端配置：目标地址 + 传输参数 + worker 参数
#[derive(Debug, Clone)]
pub struct SseConfig {
    pub url: String,
    /// 连接超时（None 表示无超时）；只作用于默认的 reqwest 传输
    pub connect_timeout: Option<Duration>,
    /// 是否主动禁用压缩（避免某些链路下的 buffering/decode 影响流式体验）
    pub accept_identity_encoding: bool,
    /// 附加请求头
    pub headers: Vec<(String, String)>,
    pub worker: WorkerOptions,
}

impl SseConfig {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Some(Duration::from_secs(30)),
            accept_identity_encoding: true,
            headers: Vec::new(),
            worker: WorkerOptions::default(),
        }
    }

    /// 设置连接超时
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// 追加请求头
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 设置取消后强制中止连接前的宽限期
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.worker.grace_period = grace;
        self
    }

    pub fn cancel_mode(mut self, mode: CancelMode) -> Self {
        self.worker.cancel_mode = mode;
        self
    }

    /// 配置错误（如非法 URL）是无限重试还是直接放弃
    pub fn connect_failure_policy(mut self, policy: ConnectFailurePolicy) -> Self {
        self.worker.connect_failure_policy = policy;
        self
    }

    /// 服务端没有给出 retry 时的重连间隔
    pub fn default_retry(mut self, delay: Duration) -> Self {
        self.worker.default_retry = delay;
        self
    }

    #[cfg(feature = "client")]
    fn reqwest_transport(&self) -> crate::transport::ReqwestTransport {
        let transport = crate::transport::ReqwestTransport::new()
            .connect_timeout(self.connect_timeout)
            .accept_identity_encoding(self.accept_identity_encoding);
        self.headers
            .iter()
            .fold(transport, |transport, (name, value)| transport.header(name, value))
    }
}

struct Running {
    cancel: CancellationToken,
    worker: ConnectionWorker,
}

/// SSE 客户端：管理至多一个 [`ConnectionWorker`]，把收到的文本组装成事件批次交给订阅者。
///
/// - 每个原始文本片段解析出的所有完整事件作为一个批次，在一次通知中投递
/// - 批次非空时用最后一个事件的 `retry` 更新重连间隔
/// - 连接错误只记录日志并重连，订阅者只会看到成功解析的事件
pub struct SseClient {
    config: SseConfig,
    logger: Arc<dyn Logger>,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<dyn Dispatcher>,
    subscribers: Arc<Subscribers>,
    running: Mutex<Option<Running>>,
}

impl SseClient {
    #[cfg(feature = "client")]
    pub fn new(url: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self::with_config(SseConfig::get(url), logger)
    }

    #[cfg(feature = "client")]
    pub fn with_config(config: SseConfig, logger: Arc<dyn Logger>) -> Self {
        let transport = Arc::new(config.reqwest_transport());
        Self::with_transport(config, logger, transport)
    }

    /// 使用自定义传输实现
    pub fn with_transport(config: SseConfig, logger: Arc<dyn Logger>, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            logger,
            transport,
            dispatcher: Arc::new(InlineDispatcher),
            subscribers: Arc::new(Subscribers::default()),
            running: Mutex::new(None),
        }
    }

    /// 设置投递执行器（默认在 worker 线程上直接投递）
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn config(&self) -> &SseConfig {
        &self.config
    }

    /// 启动后台连接；已在运行时直接返回当前 worker 的就绪信号。
    ///
    /// worker 已自行退出（如 `FailFast` 下放弃）时丢弃它并启动新的 worker。
    pub fn start(&self) -> Result<Readiness, SseError> {
        let mut running = self.running.lock();
        if let Some(current) = running.as_ref().filter(|current| !current.worker.is_finished()) {
            return Ok(current.worker.readiness());
        }
        if let Some(stale) = running.take() {
            stale.cancel.cancel();
            self.log(
                LogLevel::Verbose,
                "start",
                format!("Previous worker for '{}' has exited, restarting", self.config.url),
            );
        }

        let cancel = CancellationToken::new();
        let retry_hint = Arc::new(RetryHint::new());
        let worker = ConnectionWorker::with_options(
            self.config.url.clone(),
            cancel.clone(),
            self.chunk_sink(retry_hint.clone()),
            self.logger.clone(),
            self.transport.clone(),
            self.config.worker.clone(),
            retry_hint,
        );

        let readiness = worker.start()?;
        self.log(LogLevel::Verbose, "start", format!("Started polling '{}'", self.config.url));

        *running = Some(Running { cancel, worker });
        Ok(readiness)
    }

    /// 请求停止；不等待 worker 线程退出。未启动或已停止时是 no-op。
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        running.cancel.cancel();
        self.log(LogLevel::Verbose, "stop", format!("Stop requested for '{}'", self.config.url));
    }

    /// 是否有存活的 worker；worker 自行退出后返回 `false`
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.worker.is_finished())
    }

    /// 注册订阅者；回调在 dispatcher 决定的上下文中被调用
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&EventBatch) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(Arc::new(callback))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// 以 channel 的形式订阅事件批次
    pub fn batches(&self) -> mpsc::UnboundedReceiver<EventBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(move |batch| {
            let _ = tx.send(batch.clone());
        });
        rx
    }

    fn chunk_sink(&self, retry_hint: Arc<RetryHint>) -> impl FnMut(&str) + Send + 'static {
        let mut assembler = FrameAssembler::new();
        let subscribers = self.subscribers.clone();
        let dispatcher = self.dispatcher.clone();

        move |chunk: &str| {
            assembler.add(chunk);
            let events: Vec<SseEvent> = assembler.extract().collect();
            let Some(last) = events.last() else {
                return;
            };

            retry_hint.set_delay_ms(last.retry());
            if let Some(with_id) = events.iter().rev().find(|event| !event.id().is_empty()) {
                retry_hint.set_last_event_id(with_id.id());
            }

            let batch: EventBatch = events.into();
            let subscribers = subscribers.clone();
            dispatcher.dispatch(Box::new(move || subscribers.notify(&batch)));
        }
    }

    fn log(&self, level: LogLevel, method: &str, message: impl AsRef<str>) {
        self.logger.write(level, COMPONENT, method, message.as_ref());
    }
}

impl Drop for SseClient {
    fn drop(&mut self) {
        self.stop();
    }
}
