//! 分段索引 - 已接收分段的有序集合
//! Segment Index - Ordered set of received segments
//!
//! 每个被接受的数据包贡献一个分段。分段按 `(offset, 长度降序)` 排序，
//! 因此同一起点的较长分段先被找到。
//!
//! Every accepted packet contributes one segment. Segments order by
//! `(offset, descending length)` so a longer segment at the same start is
//! found first.

#[cfg(test)]
mod tests;

use crate::{
    buffer::BufferSegment,
    error::{Error, Result},
};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound::{Excluded, Unbounded};
use tracing::trace;

/// 一个数据包对流的贡献
/// One packet's contribution to the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Absolute stream offset of the first byte.
    /// 第一个字节的绝对流偏移。
    pub offset: u64,
    /// Payload length.
    /// 负载长度。
    pub len: u32,
}

impl Segment {
    pub fn new(offset: u64, len: u32) -> Self {
        Self { offset, len }
    }

    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.len)
    }

    pub fn overlaps(&self, other: &Segment) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }

    /// The byte range in the streaming buffer this segment covers.
    pub fn buffer_segment(&self) -> BufferSegment {
        BufferSegment {
            offset: self.offset,
            len: self.len,
        }
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.offset
            .cmp(&other.offset)
            .then_with(|| other.len.cmp(&self.len))
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 插入结果
/// Insert outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The segment touches no stored segment.
    NoOverlap,
    /// The segment intersects at least one stored segment.
    Overlap,
    /// A segment with the same offset and length is already stored. Nothing
    /// was inserted.
    ExactDuplicate(Segment),
}

/// 分段索引
/// Segment index
#[derive(Debug, Default, Clone)]
pub struct SegmentIndex {
    tree: BTreeSet<Segment>,
    /// Highest segment end seen.
    right_edge: u64,
    /// Longest segment seen. Bounds the backward overlap scan.
    max_len: u32,
}

impl SegmentIndex {
    /// 创建空索引
    /// Create empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入分段
    /// Insert segment
    ///
    /// Segments ending at or before `base_offset` are rejected.
    pub fn insert(&mut self, segment: Segment, base_offset: u64) -> Result<InsertOutcome> {
        if segment.end() <= base_offset {
            return Err(Error::SegmentBeforeBase {
                start: segment.offset,
                end: segment.end(),
                base: base_offset,
            });
        }
        if let Some(existing) = self.tree.get(&segment) {
            trace!(offset = segment.offset, len = segment.len, "Exact duplicate segment");
            return Ok(InsertOutcome::ExactDuplicate(*existing));
        }

        let beyond_right_edge = segment.offset >= self.right_edge;
        self.tree.insert(segment);
        self.right_edge = self.right_edge.max(segment.end());
        self.max_len = self.max_len.max(segment.len);

        if beyond_right_edge || !self.check_overlap(&segment) {
            trace!(offset = segment.offset, len = segment.len, "Segment inserted");
            Ok(InsertOutcome::NoOverlap)
        } else {
            trace!(offset = segment.offset, len = segment.len, "Segment inserted with overlap");
            Ok(InsertOutcome::Overlap)
        }
    }

    /// Whether a stored neighbour on either side intersects `segment`.
    pub fn check_overlap(&self, segment: &Segment) -> bool {
        let left = self.overlapping_before(segment).next().is_some();
        let right = self.overlapping_after(segment).next().is_some();
        left || right
    }

    /// Stored segments ordered before `segment` that reach into it, nearest
    /// first.
    pub fn overlapping_before<'a>(
        &'a self,
        segment: &'a Segment,
    ) -> impl Iterator<Item = Segment> + 'a {
        let max_len = u64::from(self.max_len);
        self.tree
            .range(..*segment)
            .rev()
            .take_while(move |prev| prev.offset + max_len > segment.offset)
            .filter(move |prev| prev.end() > segment.offset)
            .copied()
    }

    /// Stored segments ordered after `segment` that start inside it.
    pub fn overlapping_after<'a>(
        &'a self,
        segment: &'a Segment,
    ) -> impl Iterator<Item = Segment> + 'a {
        self.tree
            .range((Excluded(*segment), Unbounded))
            .take_while(move |next| next.offset < segment.end())
            .copied()
    }

    /// 移除分段
    /// Remove segment
    pub fn remove(&mut self, segment: &Segment) -> bool {
        self.tree.remove(segment)
    }

    /// The lowest segment.
    pub fn first(&self) -> Option<Segment> {
        self.tree.first().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Segment> + '_ {
        self.tree.iter().copied()
    }

    pub fn right_edge(&self) -> u64 {
        self.right_edge
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Drops every segment. The right edge is kept.
    pub fn clear(&mut self) {
        self.tree.clear();
        self.max_len = 0;
    }
}
