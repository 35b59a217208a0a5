//! 窗口裁剪 - 计算左边界并丢弃已消费的数据
//! Window pruning - Computes the left edge and discards consumed data
//!
//! 左边界是所有消费者都已处理完毕的最低偏移。裁剪时缓冲区滑动到左边界，
//! 然后从头部移除窗口之前且不再使用的分段。
//!
//! The left edge is the lowest offset every consumer is done with. Pruning
//! slides the buffer to the left edge, then removes segments from the head
//! that lie before the window and are no longer in use.

use super::{Direction, Stream, StreamFlags};
use crate::{config::ReassemblyConfig, seq::seq_diff};
use tracing::{debug, trace};

/// Which consumers still read from the stream.
///
/// 仍在读取流数据的消费者。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerFlags {
    pub use_app: bool,
    pub use_raw: bool,
    pub use_log: bool,
}

impl ConsumerFlags {
    /// Consumers alive for a stream with `flags`.
    pub fn for_stream(flags: &StreamFlags, config: &ReassemblyConfig) -> Self {
        Self {
            use_app: !(flags.app_layer_disabled || flags.gap),
            use_raw: !flags.disable_raw,
            use_log: config.streaming_log,
        }
    }
}

impl Stream {
    /// 当前仍活跃的消费者
    /// Consumers currently alive
    pub fn consumer_flags(&self) -> ConsumerFlags {
        ConsumerFlags::for_stream(&self.flags, &self.config)
    }

    /// 计算左边界
    /// Compute the left edge
    ///
    /// The result never retreats below the window start or any edge computed
    /// before, and never passes the buffered tail.
    pub fn compute_left_edge(&mut self, consumers: ConsumerFlags) -> u64 {
        let base = self.buffer.stream_offset();
        let tail = self.buffer.tail_offset();

        let mut edge = if consumers.use_raw {
            let mut raw = self.raw_progress;
            if self.config.inline_mode {
                raw = raw.saturating_sub(u64::from(self.chunk_size()));
            }
            if consumers.use_app {
                raw = raw.saturating_sub(u64::from(self.config.min_inspect_depth));
                self.app_progress.min(raw)
            } else {
                raw
            }
        } else if consumers.use_app {
            self.app_progress
        } else {
            tail
        };

        if consumers.use_log {
            edge = if consumers.use_app || consumers.use_raw {
                edge.min(self.log_progress)
            } else {
                self.log_progress
            };
        }

        if self.config.inline_mode {
            // Unacknowledged data may be retransmitted and must stay for
            // overlap checks.
            let acked = seq_diff(self.last_ack, self.base_seq());
            let last_ack_abs = if acked > 0 { base + acked as u64 } else { base };
            edge = edge.min(last_ack_abs);
        } else if self.config.check_overlap_different_data {
            let window = if self.window > 0 {
                self.window
            } else {
                self.config.default_window
            };
            edge = edge.saturating_sub(u64::from(window));
        }

        if edge > 0 && self.segments_in_use() {
            if let Some(first) = self.segments.first() {
                if first.offset <= edge {
                    trace!(edge, segment = first.offset, "In-use segment holds left edge");
                    edge = first.offset;
                }
            }
        }

        let lower = base.max(self.last_left_edge);
        let edge = edge.min(tail).max(lower);
        self.last_left_edge = edge;
        edge
    }

    /// 应用左边界：滑动缓冲区并移除已消费的分段
    /// Apply a left edge: slide the buffer and remove consumed segments
    ///
    /// Returns the number of bytes slid.
    pub fn apply_left_edge(&mut self, edge: u64) -> u64 {
        let slid = self.buffer.slide_to_offset(edge);
        if slid > 0 {
            self.stats.bytes_slid += slid;
            self.last_left_edge = self.last_left_edge.max(self.buffer.stream_offset());
            debug!(
                slid,
                stream_offset = self.buffer.stream_offset(),
                base_seq = self.base_seq(),
                "Stream window slid"
            );
        }

        let in_use = self.segments_in_use();
        let window_start = self.buffer.stream_offset();
        let mut removed = 0u64;
        while let Some(first) = self.segments.first() {
            if in_use || first.end() > window_start {
                break;
            }
            self.segments.remove(&first);
            removed += 1;
        }
        if removed > 0 {
            self.stats.segments_pruned += removed;
            trace!(removed, remaining = self.segments.len(), "Pruned segments");
        }
        slid
    }

    /// 裁剪流：丢弃所有消费者都不再需要的数据
    /// Prune the stream: discard data no consumer needs anymore
    pub fn prune(&mut self) {
        if self.flags.no_reassembly {
            return;
        }
        let app_dead = self.flags.app_layer_disabled || self.flags.gap;
        if self.flags.depth_reached || (app_dead && self.flags.disable_raw) {
            debug!(
                direction = ?self.direction,
                depth_reached = self.flags.depth_reached,
                "No consumer left, disabling reassembly"
            );
            self.flags.no_reassembly = true;
            self.release_all();
            return;
        }

        let edge = self.compute_left_edge(self.consumer_flags());
        self.apply_left_edge(edge);
    }

    /// 强制丢弃所有数据（例如会话超时）
    /// Force-discard everything, e.g. on session timeout
    ///
    /// Segments are removed whether or not they are in use.
    pub fn force_discard(&mut self) {
        debug!(direction = ?self.direction, segments = self.segments.len(), "Force discarding stream data");
        self.release_all();
    }

    fn release_all(&mut self) {
        let tail = self.buffer.tail_offset();
        self.stats.bytes_slid += tail - self.buffer.stream_offset();
        self.stats.segments_pruned += self.segments.len() as u64;
        self.segments.clear();
        self.buffer.clear();
        self.last_left_edge = self.last_left_edge.max(tail);
    }

    fn chunk_size(&self) -> u32 {
        match self.direction {
            Direction::ToServer => self.config.toserver_chunk_size,
            Direction::ToClient => self.config.toclient_chunk_size,
        }
    }
}
