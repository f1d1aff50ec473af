//! SSE 事件类型

use std::sync::Arc;

/// 未收到合法 `retry` 字段时的默认重连间隔（毫秒）
pub const DEFAULT_RETRY_MS: i64 = 3000;

/// 一次通知交付给订阅者的事件批次（按帧到达顺序，只读）
pub type EventBatch = Arc<[SseEvent]>;

/// 一条 SSE 事件（由 field/value 行组成，以空行结束）
///
/// 由 [`build_event`](crate::build_event) 一次性构造完成，之后不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    event: String,
    id: String,
    retry: i64,
    data: Vec<String>,
}

impl Default for SseEvent {
    fn default() -> Self {
        Self {
            event: String::new(),
            id: String::new(),
            retry: DEFAULT_RETRY_MS,
            data: Vec::new(),
        }
    }
}

impl SseEvent {
    pub(crate) fn from_parts(event: String, id: String, retry: i64, data: Vec<String>) -> Self {
        Self { event, id, retry, data }
    }

    /// 事件类型，未设置时为空串
    pub fn event(&self) -> &str {
        &self.event
    }

    /// 事件 ID，未设置时为空串
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 服务端建议的重连间隔（毫秒），默认 3000
    pub fn retry(&self) -> i64 {
        self.retry
    }

    /// 每个 `data:` 行对应一项，保持原始顺序，不合并
    pub fn data(&self) -> &[String] {
        &self.data
    }

    /// 将事件格式化为 SSE 帧文本
    ///
    /// 默认值字段（空 event/id、3000 的 retry）不输出。
    pub fn to_frame(&self) -> String {
        let mut output = String::new();

        if !self.id.is_empty() {
            output.push_str("id: ");
            output.push_str(&self.id);
            output.push('\n');
        }

        if !self.event.is_empty() {
            output.push_str("event: ");
            output.push_str(&self.event);
            output.push('\n');
        }

        if self.retry != DEFAULT_RETRY_MS {
            output.push_str("retry: ");
            output.push_str(&self.retry.to_string());
            output.push('\n');
        }

        for line in &self.data {
            output.push_str("data: ");
            output.push_str(line);
            output.push('\n');
        }

        output.push('\n'); // 空行结束事件
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_event_uses_default_retry() {
        let event = SseEvent::default();
        assert_eq!(event.event(), "");
        assert_eq!(event.id(), "");
        assert_eq!(event.retry(), 3000);
        assert!(event.data().is_empty());
    }

    #[test]
    fn to_frame_with_all_fields() {
        let event = SseEvent::from_parts(
            "message".into(),
            "123".into(),
            5000,
            vec!["hello".into(), "world".into()],
        );

        assert_eq!(
            event.to_frame(),
            "id: 123\nevent: message\nretry: 5000\ndata: hello\ndata: world\n\n"
        );
    }

    #[test]
    fn to_frame_skips_defaults() {
        let event = SseEvent::from_parts(String::new(), String::new(), 3000, vec!["x".into()]);
        assert_eq!(event.to_frame(), "data: x\n\n");
    }
}
