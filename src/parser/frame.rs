use super::field::parse_field;
use crate::event::{SseEvent, DEFAULT_RETRY_MS};

/// 帧分隔符：一个空行
pub const FRAME_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Data,
    Id,
    Event,
    Retry,
}

impl FieldKind {
    fn from_name(name: &str) -> Option<Self> {
        [
            ("data", Self::Data),
            ("id", Self::Id),
            ("event", Self::Event),
            ("retry", Self::Retry),
        ]
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, kind)| kind)
    }
}

/// 从一个完整的原始帧（包含结尾分隔符）构造事件。
///
/// 字段名大小写不敏感；`id`/`event`/`retry` 后出现的覆盖先出现的，
/// `data` 每行追加一项。retry 解析失败时重置为默认值，而不是保留之前的值。
pub fn build_event(frame: &str) -> SseEvent {
    let mut event = String::new();
    let mut id = String::new();
    let mut retry = DEFAULT_RETRY_MS;
    let mut data = Vec::new();

    for line in frame.split('\n') {
        let Some(field) = parse_field(line) else {
            continue;
        };
        let Some(kind) = FieldKind::from_name(field.name) else {
            continue;
        };

        match kind {
            FieldKind::Data => data.push(field.value.to_owned()),
            FieldKind::Id => id = field.value.to_owned(),
            FieldKind::Event => event = field.value.to_owned(),
            FieldKind::Retry => retry = parse_retry(field.value),
        }
    }

    SseEvent::from_parts(event, id, retry, data)
}

/// retry 按 32 位整数解析；超出范围与非数字一样回退到默认值
fn parse_retry(value: &str) -> i64 {
    value.trim().parse::<i32>().map_or(DEFAULT_RETRY_MS, i64::from)
}
