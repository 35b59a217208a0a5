//! 定义了流重组的可配置参数。
//! Defines configurable parameters for stream reassembly.

use crate::overlap::OsPolicy;

/// A structure containing all configurable parameters for one stream.
///
/// 包含单个流所有可配置参数的结构体。
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Byte arena parameters.
    /// 字节区参数。
    pub buffer: BufferConfig,

    /// Overlap handling and pruning parameters.
    /// 重叠处理与裁剪参数。
    pub reassembly: ReassemblyConfig,
}

/// Byte arena parameters.
///
/// 字节区参数。
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// The initial arena size. Growth to an explicit size rounds up to the
    /// next multiple of this value.
    /// 初始字节区大小。按指定大小扩容时向上取整到该值的倍数。
    pub buf_size: usize,
    /// The number of bytes kept in memory when the buffer slides
    /// automatically.
    /// 自动滑动时保留在内存中的字节数。
    pub buf_slide: usize,
    /// Slide the window forward by itself when an append does not fit.
    /// 追加数据放不下时自动向前滑动窗口。
    pub auto_slide: bool,
    /// Upper bound for the arena size in bytes. `0` disables the cap.
    /// 字节区大小上限（字节）。`0` 表示不设上限。
    pub max_size: usize,
}

/// Overlap handling and pruning parameters.
///
/// 重叠处理与裁剪参数。
#[derive(Debug, Clone)]
pub struct ReassemblyConfig {
    /// The policy used to decide between conflicting overlapping bytes.
    /// 用于裁决冲突重叠字节的策略。
    pub os_policy: OsPolicy,
    /// Compare overlapping bytes and raise an event when they differ.
    /// 比较重叠字节，不同时产生事件。
    pub check_overlap_different_data: bool,
    /// The engine sits in the traffic path and forwards what it accepts.
    /// 引擎位于流量路径中，转发它所接受的数据。
    pub inline_mode: bool,
    /// Raw reassembly chunk size for the client to server direction.
    /// 客户端到服务端方向的原始重组块大小。
    pub toserver_chunk_size: u32,
    /// Raw reassembly chunk size for the server to client direction.
    /// 服务端到客户端方向的原始重组块大小。
    pub toclient_chunk_size: u32,
    /// Bytes kept behind the raw progress so the app layer can re-inspect.
    /// 为应用层重新检测而保留在原始进度之后的字节数。
    pub min_inspect_depth: u32,
    /// Window assumed when the observed window is zero.
    /// 观测窗口为零时假定的窗口大小。
    pub default_window: u32,
    /// Maximum number of stream bytes reassembled. `0` means unlimited.
    /// 最多重组的流字节数。`0` 表示不限制。
    pub depth: u64,
    /// Whether a streaming log consumer tracks progress on this stream.
    /// 是否有流式日志消费者跟踪此流的进度。
    pub streaming_log: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buf_size: 2048,
            buf_slide: 0,
            auto_slide: false,
            max_size: 0,
        }
    }
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            os_policy: OsPolicy::Bsd,
            check_overlap_different_data: false,
            inline_mode: false,
            toserver_chunk_size: 2560,
            toclient_chunk_size: 2560,
            min_inspect_depth: 0,
            default_window: 4096,
            depth: 1024 * 1024, // 1 MiB
            streaming_log: false,
        }
    }
}
