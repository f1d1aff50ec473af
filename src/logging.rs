//! 日志接口
//!
//! worker 与 client 只通过 [`Logger::write`] 输出日志；默认实现
//! [`TracingLogger`] 把它转成带 `component`/`method` 字段的 tracing 事件。

use std::fmt;
use tracing::{debug, error, info, warn};

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Verbose,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Verbose => "Verbose",
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

/// 日志输出契约：同步调用，不得 panic，调用方不关心结果
pub trait Logger: Send + Sync {
    fn write(&self, level: LogLevel, component: &str, method: &str, message: &str);
}

/// 输出到 tracing 的默认 logger
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn write(&self, level: LogLevel, component: &str, method: &str, message: &str) {
        match level {
            LogLevel::Verbose => debug!(component, method, "{}", message),
            LogLevel::Info => info!(component, method, "{}", message),
            LogLevel::Warning => warn!(component, method, "{}", message),
            LogLevel::Error => error!(component, method, "{}", message),
        }
    }
}

impl<F> Logger for F
where
    F: Fn(LogLevel, &str, &str, &str) + Send + Sync,
{
    fn write(&self, level: LogLevel, component: &str, method: &str, message: &str) {
        self(level, component, method, message)
    }
}
