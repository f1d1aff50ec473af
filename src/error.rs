//! rust-sse-client 统一错误类型

use thiserror::Error;

/// 连接与读取过程中可能发生的错误
///
/// 这些错误只在 worker 内部流转：记录日志后进入重连流程，
/// 永远不会作为事件交给订阅者。
#[derive(Debug, Error)]
pub enum SseError {
    #[cfg(feature = "client")]
    #[error("HTTP 错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL 解析错误: {0}")]
    Url(String),

    #[error("无效的 header 值")]
    InvalidHeaderValue,

    #[error("非预期的 HTTP 状态码: {0}")]
    UnexpectedStatus(u16),

    #[error("无效的 content-type: 期望 text/event-stream, 收到 {0:?}")]
    InvalidContentType(Option<String>),

    #[error("服务端关闭了事件流")]
    StreamEnded,

    #[error("连接已被强制中止")]
    Aborted,

    #[error("传输错误: {0}")]
    Transport(String),

    #[error("无法启动 worker 线程: {0}")]
    Spawn(#[from] std::io::Error),
}

impl SseError {
    /// 是否属于配置错误（重试也不可能成功）
    ///
    /// 仅在 `ConnectFailurePolicy::FailFast` 下影响 worker 行为。
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Url(_) | Self::InvalidHeaderValue => true,
            #[cfg(feature = "client")]
            Self::Http(e) => e.is_builder(),
            _ => false,
        }
    }
}
