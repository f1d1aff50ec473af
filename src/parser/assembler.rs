use super::frame::{build_event, FRAME_SEPARATOR};
use crate::event::SseEvent;

/// 帧组装器：接收任意切分的文本片段，按 `\n\n` 切出完整帧。
///
/// 缓冲区在任意时刻都可以看作「0..N 个完整帧 + 至多一个未完成帧」。
/// 只有 [`add`](Self::add)（追加）和 [`extract`](Self::extract)（从头部消费）会修改它。
///
/// 无论输入如何切分，产出的事件序列与把所有片段拼接后一次性解析的结果相同。
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: String,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 原样追加一个片段，不做解析
    pub fn add(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
    }

    /// 惰性地取出当前缓冲区中所有完整帧对应的事件。
    ///
    /// 每次迭代从缓冲区头部查找分隔符，找到则构造事件并移除该前缀；
    /// 找不到时迭代结束，剩余的未完成帧留在缓冲区等待后续 `add`。
    pub fn extract(&mut self) -> Extract<'_> {
        Extract { assembler: self }
    }

    /// 尚未凑成完整帧的缓冲内容
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn take_frame(&mut self) -> Option<SseEvent> {
        let end = self.buffer.find(FRAME_SEPARATOR)? + FRAME_SEPARATOR.len();
        let event = build_event(&self.buffer[..end]);
        self.buffer.drain(..end);
        Some(event)
    }
}

/// [`FrameAssembler::extract`] 返回的迭代器
#[derive(Debug)]
pub struct Extract<'a> {
    assembler: &'a mut FrameAssembler,
}

impl Iterator for Extract<'_> {
    type Item = SseEvent;

    fn next(&mut self) -> Option<SseEvent> {
        self.assembler.take_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(chunks: &[&str]) -> Vec<SseEvent> {
        let mut assembler = FrameAssembler::new();
        let mut events = Vec::new();
        for chunk in chunks {
            assembler.add(chunk);
            events.extend(assembler.extract());
        }
        events
    }

    #[test]
    fn keeps_partial_frame_in_buffer() {
        let mut assembler = FrameAssembler::new();
        assembler.add("data: one\n\ndata: two\n\nid: 3\ndata: thr");

        let events: Vec<_> = assembler.extract().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data(), ["one"]);
        assert_eq!(events[1].data(), ["two"]);
        assert_eq!(assembler.pending(), "id: 3\ndata: thr");

        // 再次 extract 不会消费未完成帧
        assert_eq!(assembler.extract().count(), 0);
        assert_eq!(assembler.pending(), "id: 3\ndata: thr");
    }

    #[test]
    fn frame_split_mid_field_and_mid_separator() {
        let events = feed(&["id: 1\nev", "ent: greeting\n", "data: hel", "lo\n", "\n", "data: x\n"]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id(), "1");
        assert_eq!(events[0].event(), "greeting");
        assert_eq!(events[0].data(), ["hello"]);
    }

    #[test]
    fn byte_by_byte_matches_single_chunk() {
        let input = "event: a\ndata: 1\n\nretry: 10\ndata: 2\ndata: 3\n\n: x\n\nid: z\n";
        let chunks: Vec<String> = input.chars().map(String::from).collect();
        let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();

        assert_eq!(feed(&refs), feed(&[input]));
        assert_eq!(feed(&[input]).len(), 3);
    }

    #[test]
    fn extract_is_lazy() {
        let mut assembler = FrameAssembler::new();
        assembler.add("data: a\n\ndata: b\n\n");

        let first = assembler.extract().next().unwrap();
        assert_eq!(first.data(), ["a"]);
        assert_eq!(assembler.pending(), "data: b\n\n");
    }

    #[test]
    fn clear_drops_pending_frame() {
        let mut assembler = FrameAssembler::new();
        assembler.add("data: half");
        assert!(!assembler.is_empty());
        assembler.clear();
        assert!(assembler.is_empty());
        assert_eq!(assembler.len(), 0);
    }
}
