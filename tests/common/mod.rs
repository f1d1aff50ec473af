//! 集成测试共用的工具：可记录日志的 logger、脚本化的传输实现、轮询等待

#![allow(dead_code)]

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use rust_sse_client::{ByteStream, LogLevel, Logger, OpenRequest, SseError, Transport};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub component: String,
    pub method: String,
    pub message: String,
}

/// 把所有日志记在内存里
#[derive(Debug, Default)]
pub struct CapturedLogger {
    lines: Mutex<Vec<LogLine>>,
}

impl CapturedLogger {
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().clone()
    }

    pub fn count(&self, level: LogLevel, needle: &str) -> usize {
        self.lines
            .lock()
            .iter()
            .filter(|line| line.level == level && line.message.contains(needle))
            .count()
    }
}

impl Logger for CapturedLogger {
    fn write(&self, level: LogLevel, component: &str, method: &str, message: &str) {
        self.lines.lock().push(LogLine {
            level,
            component: component.to_string(),
            method: method.to_string(),
            message: message.to_string(),
        });
    }
}

/// 一次连接的剧本
pub enum Step {
    /// 连接失败
    Fail(&'static str),
    /// 依次产出这些 chunk，然后结束（服务端关闭连接）
    Finite(Vec<&'static [u8]>),
    /// 依次产出这些 chunk，然后永远阻塞在读取上
    Hang(Vec<&'static [u8]>),
}

/// 按剧本响应每次连接；剧本用完后每次连接都永远阻塞
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    connections: AtomicUsize,
    last_event_ids: Mutex<Vec<Option<String>>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn last_event_ids(&self) -> Vec<Option<String>> {
        self.last_event_ids.lock().clone()
    }
}

fn chunks(items: Vec<&'static [u8]>) -> impl futures_core::Stream<Item = Result<Bytes, SseError>> + Send {
    stream::iter(items.into_iter().map(|chunk| Ok(Bytes::from_static(chunk))))
}

impl Transport for ScriptedTransport {
    fn open<'a>(
        &'a self,
        request: OpenRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, SseError>> + Send + 'a>> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        self.last_event_ids
            .lock()
            .push(request.last_event_id.map(str::to_string));
        let step = self.script.lock().pop_front();

        Box::pin(async move {
            let stream: ByteStream = match step {
                Some(Step::Fail(message)) => return Err(SseError::Transport(message.to_string())),
                Some(Step::Finite(items)) => Box::pin(chunks(items)),
                Some(Step::Hang(items)) => Box::pin(chunks(items).chain(stream::pending())),
                None => Box::pin(stream::pending()),
            };
            Ok(stream)
        })
    }
}

/// 轮询直到条件成立或超时
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// 安装测试用的 tracing subscriber（RUST_LOG 控制级别），重复调用无副作用
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
