//! rust-sse-client: 带自动重连的 SSE 客户端
//!
//! 本库提供:
//! - 增量 SSE 帧解析器（任意切分的输入都得到相同的事件序列）
//! - 在独立线程上运行的连接 worker，失败后按服务端建议的 retry 间隔重连
//! - 按批次投递事件的客户端外观，支持多个订阅者与显式的投递执行器
//!
//! # 功能特性
//!
//! - `client` (默认): 使用 reqwest 的传输实现
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use rust_sse_client::{SseClient, TracingLogger};
//! use std::sync::Arc;
//!
//! let client = SseClient::new("https://example.com/events", Arc::new(TracingLogger));
//! client.subscribe(|batch| {
//!     for event in batch.iter() {
//!         println!("事件: {} {:?}", event.event(), event.data());
//!     }
//! });
//!
//! client.start().unwrap().wait_blocking();
//! // ...
//! client.stop();
//! ```
//!
//! ## 在 tokio runtime 上接收事件
//!
//! ```rust,no_run
//! use rust_sse_client::{SseClient, SseConfig, TokioDispatcher, TracingLogger};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = SseConfig::get("https://example.com/events").grace_period(Duration::from_millis(200));
//! let client = SseClient::with_config(config, Arc::new(TracingLogger))
//!     .dispatcher(Arc::new(TokioDispatcher::current().unwrap()));
//!
//! let mut batches = client.batches();
//! client.start().unwrap().wait().await;
//! while let Some(batch) = batches.recv().await {
//!     println!("收到 {} 个事件", batch.len());
//! }
//! # }
//! ```

mod client;
mod dispatch;
mod error;
mod event;
mod logging;
pub mod parser;
pub mod transport;
pub mod worker;

pub use client::{SseClient, SseConfig};
pub use dispatch::{Dispatcher, InlineDispatcher, Job, SubscriptionId, TokioDispatcher};
pub use error::SseError;
pub use event::{EventBatch, SseEvent, DEFAULT_RETRY_MS};
pub use logging::{LogLevel, Logger, TracingLogger};
pub use parser::{build_event, parse_field, FrameAssembler, FRAME_SEPARATOR};
pub use transport::{ByteStream, OpenRequest, Transport};
pub use worker::{
    CancelMode, ChunkSink, ConnectFailurePolicy, ConnectionWorker, Readiness, RetryHint, WorkerOptions,
    WorkerState,
};

#[cfg(feature = "client")]
pub use transport::ReqwestTransport;
