//! 定义了重组核心中所有可能的错误类型。
//! Defines all possible error types of the reassembly core.

use thiserror::Error;

/// The primary error type for the stream reassembly library.
/// 流重组库的主要错误类型。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The whole segment lies before the retained window. Retransmission of
    /// data that was already consumed; the segment is discarded.
    ///
    /// 整个分段位于保留窗口之前。这是对已消费数据的重传，分段将被丢弃。
    #[error("segment [{start}, {end}) lies entirely before the stream base offset {base}")]
    SegmentBeforeBase { start: u64, end: u64, base: u64 },

    /// Growing the byte arena failed, either because the allocator refused
    /// or because the configured memory cap would be exceeded.
    ///
    /// 字节区扩容失败：分配器拒绝分配，或将超出配置的内存上限。
    #[error("failed to allocate {requested} bytes for stream reassembly")]
    AllocationFailure { requested: usize },

    /// A write was attempted before the start of the buffer window.
    /// Callers guard against this with the base offset check, so seeing it
    /// means a logic error upstream.
    ///
    /// 试图在缓冲区窗口起点之前写入。调用方已通过基准偏移检查防止这种情况，
    /// 出现此错误意味着上游存在逻辑错误。
    #[error("offset {offset} is before the buffer window starting at {window_start}")]
    OffsetBeforeWindow { offset: u64, window_start: u64 },

    /// An overlap policy name that is not recognised.
    /// 无法识别的重叠策略名称。
    #[error("unknown overlap policy '{name}'")]
    UnknownPolicy { name: String },
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;
