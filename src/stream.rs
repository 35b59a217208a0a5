//! 单方向 TCP 流的重组状态。
//! Reassembly state of one TCP stream direction.
//!
//! A `Stream` owns the streaming buffer, the segment index and the overlap
//! resolver for one direction. Packets enter through
//! [`Stream::accept_segment`], consumers read through
//! [`Stream::get_contiguous_data`] and report progress back, and
//! [`Stream::prune`] discards what every consumer is done with.

pub mod prune;


pub use prune::ConsumerFlags;

use crate::{
    buffer::StreamingBuffer,
    config::{Config, ReassemblyConfig},
    error::Result,
    overlap::{OsPolicy, OverlapResolver, OverlapSettings},
    pool::ArenaPool,
    segment::{InsertOutcome, Segment, SegmentIndex},
    seq::seq_diff,
};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// 流方向
/// Stream direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ToServer,
    ToClient,
}

/// 流状态标志
/// Stream state flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamFlags {
    /// Application protocol detection finished for this direction.
    pub app_detection_complete: bool,
    /// The application layer gave up on the session.
    pub app_layer_disabled: bool,
    /// Data was lost; the application layer cannot continue.
    pub gap: bool,
    /// Raw reassembly is no longer needed.
    pub disable_raw: bool,
    /// Reassembly is off for this direction. Segments are ignored.
    pub no_reassembly: bool,
    /// Data beyond the configured reassembly depth arrived.
    pub depth_reached: bool,
}

/// Anomalies queued on the stream for the detection layer.
///
/// 流上排队等待检测层处理的异常事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// A segment lay entirely before the retained window.
    SegmentBeforeBase { offset: u64, len: u32 },
    /// Overlapping data differed from what was already accepted.
    OverlapDifferentData { offset: u64, len: u32 },
    /// Data arrived beyond the reassembly depth.
    ReassemblyDepthReached,
}

/// 流统计信息
/// Stream statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub segments_inserted: u64,
    pub overlaps: u64,
    pub overlaps_different_data: u64,
    pub duplicates: u64,
    pub before_base: u64,
    pub insert_failures: u64,
    pub segments_pruned: u64,
    pub bytes_slid: u64,
}

/// What happened to an accepted payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A new segment was stored.
    Inserted,
    /// The segment matched a stored one by offset and length.
    Duplicate,
    /// The segment lay entirely before the window and was discarded.
    BeforeBase,
    /// Nothing to do: empty payload, reassembly off, or past the depth.
    Skipped,
}

/// 插入报告
/// Insert report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertReport {
    pub disposition: Disposition,
    /// The segment overlapped stored segments.
    pub overlap: bool,
    /// An `OverlapDifferentData` event was raised for this insert.
    pub different_data: bool,
    /// Inline mode only: the payload to forward when it had to be rewritten.
    pub forwarded: Option<Bytes>,
}

impl InsertReport {
    fn new(disposition: Disposition) -> Self {
        Self {
            disposition,
            overlap: false,
            different_data: false,
            forwarded: None,
        }
    }
}

/// 单方向流
/// One stream direction
#[derive(Debug)]
pub struct Stream {
    direction: Direction,
    /// Sequence number of stream offset 0.
    initial_seq: u32,
    config: ReassemblyConfig,
    buffer: StreamingBuffer,
    segments: SegmentIndex,
    resolver: OverlapResolver,
    flags: StreamFlags,
    window: u32,
    last_ack: u32,
    /// Consumer progress, absolute offsets.
    app_progress: u64,
    raw_progress: u64,
    log_progress: u64,
    last_left_edge: u64,
    events: Vec<StreamEvent>,
    stats: StreamStats,
}

impl Stream {
    /// 创建新的流
    /// Create new stream
    ///
    /// `base_seq` is the sequence number of the first data byte.
    pub fn new(direction: Direction, base_seq: u32, config: Config) -> Self {
        let buffer = StreamingBuffer::new(config.buffer);
        Self::with_buffer(direction, base_seq, config.reassembly, buffer)
    }

    /// 创建从对象池获取字节区的流
    /// Create stream drawing its arena from a pool
    pub fn with_arena_pool(
        direction: Direction,
        base_seq: u32,
        config: Config,
        pool: Arc<ArenaPool>,
    ) -> Self {
        let buffer = StreamingBuffer::with_pool(config.buffer, pool);
        Self::with_buffer(direction, base_seq, config.reassembly, buffer)
    }

    fn with_buffer(
        direction: Direction,
        base_seq: u32,
        config: ReassemblyConfig,
        buffer: StreamingBuffer,
    ) -> Self {
        Self {
            direction,
            initial_seq: base_seq,
            resolver: OverlapResolver::new(OverlapSettings::from(&config)),
            config,
            buffer,
            segments: SegmentIndex::new(),
            flags: StreamFlags::default(),
            window: 0,
            last_ack: base_seq,
            app_progress: 0,
            raw_progress: 0,
            log_progress: 0,
            last_left_edge: 0,
            events: Vec::new(),
            stats: StreamStats::default(),
        }
    }

    /// 接受一个数据包负载
    /// Accept one packet payload
    ///
    /// Errors abort only this payload. Everything committed before stays
    /// intact and the segment is not left in the index.
    ///
    /// Per-packet TCP state is not passed here: window and acknowledgement
    /// updates arrive through [`Stream::set_window`] and
    /// [`Stream::set_last_ack`].
    pub fn accept_segment(&mut self, seq: u32, payload: &[u8]) -> Result<InsertReport> {
        if payload.is_empty() || self.flags.no_reassembly {
            return Ok(InsertReport::new(Disposition::Skipped));
        }

        let base = self.buffer.stream_offset();
        let diff = seq_diff(seq, self.base_seq());
        if diff + payload.len() as i64 <= 0 {
            let offset = base.saturating_add_signed(diff);
            debug!(seq, offset, len = payload.len(), base, "Segment before base sequence, discarding");
            self.events.push(StreamEvent::SegmentBeforeBase {
                offset,
                len: payload.len() as u32,
            });
            self.stats.before_base += 1;
            return Ok(InsertReport::new(Disposition::BeforeBase));
        }

        // Bytes before the window were consumed already.
        let (skip, offset) = if diff < 0 {
            ((-diff) as usize, base)
        } else {
            (0, base + diff as u64)
        };
        let Some(len) = self.depth_limited_len(offset, payload.len() - skip) else {
            return Ok(InsertReport::new(Disposition::Skipped));
        };
        let data = &payload[skip..skip + len];

        let segment = Segment::new(offset, len as u32);
        trace!(seq, offset, len, "Accepting segment");
        match self.segments.insert(segment, base)? {
            InsertOutcome::NoOverlap => {
                if let Err(err) = self.buffer.insert_at(data, offset) {
                    self.segments.remove(&segment);
                    self.stats.insert_failures += 1;
                    warn!(offset, len, error = %err, "Failed to store segment data");
                    return Err(err);
                }
                self.stats.segments_inserted += 1;
                Ok(InsertReport::new(Disposition::Inserted))
            }
            outcome => self.insert_overlapping(segment, outcome, payload, skip),
        }
    }

    fn insert_overlapping(
        &mut self,
        segment: Segment,
        outcome: InsertOutcome,
        payload: &[u8],
        skip: usize,
    ) -> Result<InsertReport> {
        self.stats.overlaps += 1;
        let data = &payload[skip..skip + segment.len as usize];
        self.resolver.load(segment, data);

        let mut report_different = false;
        let handle = match outcome {
            InsertOutcome::ExactDuplicate(existing) => {
                report_different |= self.resolver.resolve(&existing, &self.buffer).report;
                existing
            }
            _ => segment,
        };
        for existing in self.segments.overlapping_before(&handle) {
            report_different |= self.resolver.resolve(&existing, &self.buffer).report;
        }
        for existing in self.segments.overlapping_after(&handle) {
            report_different |= self.resolver.resolve(&existing, &self.buffer).report;
        }

        if let Err(err) = self.buffer.insert_at(self.resolver.data(), segment.offset) {
            if outcome == InsertOutcome::Overlap {
                self.segments.remove(&segment);
            }
            self.stats.insert_failures += 1;
            warn!(offset = segment.offset, len = segment.len, error = %err, "Failed to store overlapping segment data");
            return Err(err);
        }

        if report_different {
            self.events.push(StreamEvent::OverlapDifferentData {
                offset: segment.offset,
                len: segment.len,
            });
            self.stats.overlaps_different_data += 1;
        }

        let disposition = if let InsertOutcome::ExactDuplicate(_) = outcome {
            self.stats.duplicates += 1;
            Disposition::Duplicate
        } else {
            self.stats.segments_inserted += 1;
            Disposition::Inserted
        };

        // Only the resolved range is rewritten. Bytes trimmed before the
        // window or past the depth go out as received.
        let forwarded = (self.config.inline_mode && self.resolver.rewritten()).then(|| {
            let mut out = BytesMut::with_capacity(payload.len());
            out.extend_from_slice(&payload[..skip]);
            out.extend_from_slice(self.resolver.data());
            out.extend_from_slice(&payload[skip + data.len()..]);
            out.freeze()
        });

        trace!(
            offset = segment.offset,
            len = segment.len,
            ?disposition,
            different = report_different,
            "Overlapping segment stored"
        );
        Ok(InsertReport {
            disposition,
            overlap: true,
            different_data: report_different,
            forwarded,
        })
    }

    /// Number of bytes of a payload at `offset` that fall within the
    /// reassembly depth. `None` once the depth is exceeded.
    fn depth_limited_len(&mut self, offset: u64, len: usize) -> Option<usize> {
        let depth = self.config.depth;
        if self.flags.depth_reached {
            return None;
        }
        if depth == 0 || offset + len as u64 <= depth {
            return Some(len);
        }
        if offset < depth {
            return Some((depth - offset) as usize);
        }
        self.flags.depth_reached = true;
        self.events.push(StreamEvent::ReassemblyDepthReached);
        debug!(offset, depth, "Reassembly depth reached");
        None
    }

    /// 读取从 `from` 开始的可用数据块
    /// Read the available data runs starting at `from`
    ///
    /// Yields `(offset, bytes)` for each run of materialized bytes ending
    /// after `from`, lowest first. Offsets before the window start at the
    /// window.
    pub fn get_contiguous_data(&self, from: u64) -> impl Iterator<Item = (u64, &[u8])> + '_ {
        let from = from.max(self.buffer.stream_offset());
        self.buffer.blocks_from(from).filter_map(move |block| {
            let start = block.offset.max(from);
            self.buffer.get_data_at(start).map(|data| (start, data))
        })
    }

    /// End of the gap-free data starting at the window head.
    pub fn gap_free_end(&self) -> u64 {
        let start = self.buffer.stream_offset();
        match self.buffer.head_block() {
            Some(block) if block.offset == start => block.end(),
            _ => start,
        }
    }

    /// TCP sequence number of the first retained byte.
    pub fn base_seq(&self) -> u32 {
        self.initial_seq.wrapping_add(self.buffer.stream_offset() as u32)
    }

    /// Absolute offset of the first retained byte.
    pub fn stream_offset(&self) -> u64 {
        self.buffer.stream_offset()
    }

    /// 设置应用层进度（绝对偏移，只增不减）
    /// Set the app-layer progress, an absolute offset that never moves back
    pub fn set_app_progress(&mut self, offset: u64) {
        self.app_progress = self.app_progress.max(offset);
    }

    /// 设置原始重组进度
    /// Set the raw reassembly progress
    pub fn set_raw_progress(&mut self, offset: u64) {
        self.raw_progress = self.raw_progress.max(offset);
    }

    /// 设置流式日志进度
    /// Set the streaming log progress
    pub fn set_log_progress(&mut self, offset: u64) {
        self.log_progress = self.log_progress.max(offset);
    }

    /// 应用层进度
    /// App-layer progress
    pub fn app_progress(&self) -> u64 {
        self.app_progress
    }

    /// 原始重组进度
    /// Raw reassembly progress
    pub fn raw_progress(&self) -> u64 {
        self.raw_progress
    }

    /// 流式日志进度
    /// Streaming log progress
    pub fn log_progress(&self) -> u64 {
        self.log_progress
    }

    /// App progress relative to the window start.
    pub fn app_progress_rel(&self) -> u64 {
        self.app_progress.saturating_sub(self.stream_offset())
    }

    /// 相对窗口起点的原始重组进度
    /// Raw progress relative to the window start
    pub fn raw_progress_rel(&self) -> u64 {
        self.raw_progress.saturating_sub(self.stream_offset())
    }

    /// 相对窗口起点的日志进度
    /// Log progress relative to the window start
    pub fn log_progress_rel(&self) -> u64 {
        self.log_progress.saturating_sub(self.stream_offset())
    }

    /// Observed receive window.
    pub fn set_window(&mut self, window: u32) {
        self.window = window;
    }

    /// Highest cumulative acknowledgement seen for this direction.
    pub fn set_last_ack(&mut self, ack: u32) {
        self.last_ack = ack;
    }

    /// 更新重叠策略（例如通过操作系统指纹识别）
    /// Update the overlap policy, e.g. after OS fingerprinting
    pub fn set_os_policy(&mut self, policy: OsPolicy) {
        self.config.os_policy = policy;
        self.resolver.set_policy(policy);
    }

    /// 当前重叠策略
    /// Current overlap policy
    pub fn os_policy(&self) -> OsPolicy {
        self.config.os_policy
    }

    /// 标记应用协议识别完成
    /// Mark app protocol detection complete
    pub fn set_app_detection_complete(&mut self) {
        self.flags.app_detection_complete = true;
    }

    /// 禁用应用层
    /// Disable the app layer
    pub fn set_app_layer_disabled(&mut self) {
        self.flags.app_layer_disabled = true;
    }

    /// 标记数据丢失
    /// Mark data loss
    pub fn set_gap(&mut self) {
        self.flags.gap = true;
    }

    /// 禁用原始重组
    /// Disable raw reassembly
    pub fn set_disable_raw(&mut self) {
        self.flags.disable_raw = true;
    }

    /// Turns reassembly off. Later payloads are skipped.
    pub fn set_no_reassembly(&mut self) {
        if !self.flags.no_reassembly {
            debug!(direction = ?self.direction, "Reassembly disabled");
        }
        self.flags.no_reassembly = true;
    }

    /// 流状态标志
    /// Stream state flags
    pub fn flags(&self) -> StreamFlags {
        self.flags
    }

    /// Segments a pending classifier may still need. The check is per
    /// stream: until protocol detection completes every segment is kept.
    pub fn segments_in_use(&self) -> bool {
        !(self.flags.gap || self.flags.no_reassembly) && !self.flags.app_detection_complete
    }

    /// Drain the queued anomaly events.
    pub fn take_events(&mut self) -> Vec<StreamEvent> {
        std::mem::take(&mut self.events)
    }

    /// 获取统计信息
    /// Get statistics
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// 流方向
    /// Stream direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// 分段索引
    /// Segment index
    pub fn segments(&self) -> &SegmentIndex {
        &self.segments
    }

    /// 流式缓冲区
    /// Streaming buffer
    pub fn buffer(&self) -> &StreamingBuffer {
        &self.buffer
    }
}
