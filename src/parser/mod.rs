//! SSE 增量解析
//!
//! 三个阶段，由小到大：
//! - [`parse_field`]：一行 -> field/value
//! - [`build_event`]：一个以 `\n\n` 结尾的完整帧 -> [`SseEvent`](crate::SseEvent)
//! - [`FrameAssembler`]：任意切分的文本片段 -> 0..N 个完整帧
//!
//! 解析层从不报错：未知字段、无冒号的行、非法 retry 值都在本地忽略或取默认值。

mod assembler;
mod field;
mod frame;

pub use assembler::{Extract, FrameAssembler};
pub use field::{parse_field, Field};
pub use frame::{build_event, FRAME_SEPARATOR};
