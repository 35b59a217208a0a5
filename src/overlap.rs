//! 重叠解析器 - 按操作系统策略裁决冲突字节
//! Overlap Resolver - Decides conflicting bytes by OS policy
//!
//! 新分段的负载先复制到暂存区。对每个与之重叠的已有分段，解析器按策略
//! 决定重叠区间使用哪一方的字节；选择旧数据时，把缓冲区中当前的字节
//! 拼接到暂存区。所有邻居处理完后，暂存区即为最终写入的内容。
//!
//! The new segment's payload is first copied to a scratch buffer. For every
//! stored segment it overlaps, the resolver decides per policy whose bytes
//! fill the overlapping range; when the old bytes win, the bytes currently in
//! the streaming buffer are spliced into the scratch buffer. Once every
//! neighbour is handled, the scratch buffer holds what gets written.

pub mod policy;


pub use policy::{OsPolicy, OverlapKind};

use crate::{buffer::StreamingBuffer, config::ReassemblyConfig, segment::Segment};
use bytes::BytesMut;
use tracing::trace;

/// Settings that drive overlap resolution for one stream.
///
/// 驱动单个流重叠解析的设置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapSettings {
    pub policy: OsPolicy,
    /// Compare overlapping bytes and report differences.
    pub check_different_data: bool,
    /// Already accepted bytes always win and the packet is rewritten.
    pub inline_mode: bool,
}

impl From<&ReassemblyConfig> for OverlapSettings {
    fn from(config: &ReassemblyConfig) -> Self {
        Self {
            policy: config.os_policy,
            check_different_data: config.check_overlap_different_data,
            inline_mode: config.inline_mode,
        }
    }
}

/// The outcome of resolving against one stored segment.
///
/// 针对单个已有分段的解析结果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verdict {
    /// Some stored bytes overlapped the new segment.
    pub overlapped: bool,
    /// The overlapping bytes differ. Assumed when differences are not checked.
    pub different: bool,
    /// The new bytes won the overlapping range.
    pub used_new: bool,
    /// The difference should be reported as an anomaly.
    pub report: bool,
}

/// 重叠解析器
/// Overlap resolver
#[derive(Debug)]
pub struct OverlapResolver {
    settings: OverlapSettings,
    segment: Segment,
    /// Payload as received.
    packet: BytesMut,
    /// Payload as it will be written.
    scratch: BytesMut,
    rewritten: bool,
}

impl OverlapResolver {
    /// 创建新的解析器
    /// Create new resolver
    pub fn new(settings: OverlapSettings) -> Self {
        Self {
            settings,
            segment: Segment::new(0, 0),
            packet: BytesMut::new(),
            scratch: BytesMut::new(),
            rewritten: false,
        }
    }

    pub fn set_policy(&mut self, policy: OsPolicy) {
        self.settings.policy = policy;
    }

    /// 载入新分段及其负载，开始一次解析
    /// Load a new segment and its payload to start a resolution
    pub fn load(&mut self, segment: Segment, payload: &[u8]) {
        debug_assert_eq!(payload.len(), segment.len as usize);
        self.segment = segment;
        self.packet.clear();
        self.packet.extend_from_slice(payload);
        self.scratch.clear();
        self.scratch.extend_from_slice(payload);
        self.rewritten = false;
    }

    /// 针对一个已有分段裁决重叠区间
    /// Resolve the overlapping range against one stored segment
    pub fn resolve(&mut self, existing: &Segment, buffer: &StreamingBuffer) -> Verdict {
        let Some(old) = buffer.segment_data(&existing.buffer_segment()) else {
            return Verdict::default();
        };
        // `segment_data` clips a segment that starts before the window.
        let old_start = existing.offset.max(buffer.stream_offset());
        let new = self.segment;
        let start = new.offset.max(old_start);
        let end = new.end().min(old_start + old.len() as u64);
        if start >= end {
            return Verdict::default();
        }

        let new_range = (start - new.offset) as usize..(end - new.offset) as usize;
        let old_range = (start - old_start) as usize..(end - old_start) as usize;
        let differs = self.packet[new_range.clone()] != old[old_range.clone()];
        let check = self.settings.check_different_data;

        if self.settings.inline_mode {
            if differs {
                self.scratch[new_range].copy_from_slice(&old[old_range]);
                self.rewritten = true;
                trace!(offset = start, len = end - start, "Inline overlap, keeping accepted data");
            }
            return Verdict {
                overlapped: true,
                different: differs,
                used_new: false,
                report: check && differs,
            };
        }

        let different = if check { differs } else { true };
        let kind = OverlapKind::classify(&new, existing);
        let used_new = different && self.settings.policy.prefers_new(kind);
        if different && !used_new {
            self.scratch[new_range].copy_from_slice(&old[old_range]);
        }
        trace!(
            offset = start,
            len = end - start,
            ?kind,
            policy = %self.settings.policy,
            different,
            used_new,
            "Overlap resolved"
        );
        Verdict {
            overlapped: true,
            different,
            used_new,
            report: check && different,
        }
    }

    /// The bytes to write for the loaded segment.
    pub fn data(&self) -> &[u8] {
        &self.scratch
    }

    /// The payload to forward differs from what was received.
    pub fn rewritten(&self) -> bool {
        self.rewritten
    }
}
