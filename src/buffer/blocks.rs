//! 块索引 - 连续数据区间集合
//! Block Index - Set of contiguous data ranges
//!
//! 记录字节窗口中哪些区间持有有效数据。窗口无空洞时索引保持为空；
//! 第一次出现空洞时才建立区间。
//!
//! Records which ranges of the byte window hold valid data. The index stays
//! empty while the window has no holes and is only populated once the first
//! gap appears.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};
use tracing::trace;

/// A maximal run of materialized bytes, in absolute stream offsets.
///
/// 一段极大的已物化连续字节（绝对偏移）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    pub offset: u64,
    pub len: u64,
}

impl Block {
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.offset && offset < self.end()
    }
}

/// Window state as it was just before a write, needed to interpret the write
/// while the index is still empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub stream_offset: u64,
    pub tail: usize,
}

/// 块索引
/// Block index
///
/// Blocks are keyed by start offset. No two blocks overlap or touch.
#[derive(Debug, Default, Clone)]
pub struct BlockIndex {
    tree: BTreeMap<u64, u64>,
    head: Option<Block>,
}

impl BlockIndex {
    /// 创建空的块索引
    /// Create empty block index
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次写入 `[rel_offset, rel_offset + len)`（相对窗口起点）
    /// Record a write of `[rel_offset, rel_offset + len)` relative to the window start
    pub fn update(&mut self, window: Window, rel_offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        let offset = window.stream_offset + rel_offset as u64;
        if !self.tree.is_empty() {
            self.insert(offset, len as u64);
            return;
        }

        // The window was gap-free before this write. It stays gap-free unless
        // the write starts past the tail.
        if rel_offset <= window.tail {
            return;
        }
        if window.tail > 0 {
            self.tree.insert(window.stream_offset, window.tail as u64);
            self.tree.insert(offset, len as u64);
            trace!(gap_start = window.stream_offset + window.tail as u64, gap_end = offset, "Block index split by gap");
        } else {
            self.tree.insert(offset, len as u64);
            trace!(offset, len, "Block index started with leading gap");
        }
        self.refresh_head();
    }

    /// Inserts `[offset, offset + len)`, merging every block it overlaps or touches.
    fn insert(&mut self, offset: u64, len: u64) {
        if self.tree.get(&offset) == Some(&len) {
            return;
        }
        let mut start = offset;
        let mut end = offset + len;

        // Backward: predecessors reaching `start`.
        while let Some((&prev_offset, &prev_len)) = self.tree.range(..=start).next_back() {
            if prev_offset + prev_len < start {
                break;
            }
            self.tree.remove(&prev_offset);
            start = prev_offset;
            end = end.max(prev_offset + prev_len);
        }

        // Forward: successors starting at or before `end`.
        while let Some((&next_offset, &next_len)) = self.tree.range(start..).next() {
            if next_offset > end {
                break;
            }
            self.tree.remove(&next_offset);
            end = end.max(next_offset + next_len);
        }

        self.tree.insert(start, end - start);
        self.refresh_head();
        trace!(offset = start, len = end - start, blocks = self.tree.len(), "Block merged");
    }

    /// 裁剪 `offset` 之前的块
    /// Prune blocks before `offset`
    ///
    /// A block straddling `offset` is shrunk to start at `offset`.
    pub fn prune_to(&mut self, offset: u64) {
        while let Some((&block_offset, &block_len)) = self.tree.first_key_value() {
            if block_offset >= offset {
                break;
            }
            self.tree.remove(&block_offset);
            let end = block_offset + block_len;
            if end > offset {
                self.tree.insert(offset, end - offset);
                break;
            }
        }
        self.refresh_head();
    }

    /// The lowest block.
    pub fn head(&self) -> Option<Block> {
        self.head
    }

    /// The block containing `offset`.
    pub fn find(&self, offset: u64) -> Option<Block> {
        self.tree
            .range(..=offset)
            .next_back()
            .map(|(&start, &len)| Block { offset: start, len })
            .filter(|block| block.contains(offset))
    }

    /// Blocks ending after `offset`, in order.
    pub fn range_from(&self, offset: u64) -> impl Iterator<Item = Block> + '_ {
        let containing = self.find(offset);
        containing.into_iter().chain(
            self.tree
                .range((Excluded(offset), Unbounded))
                .map(|(&offset, &len)| Block { offset, len }),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = Block> + '_ {
        self.tree.iter().map(|(&offset, &len)| Block { offset, len })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn clear(&mut self) {
        self.tree.clear();
        self.head = None;
    }

    fn refresh_head(&mut self) {
        self.head = self
            .tree
            .first_key_value()
            .map(|(&offset, &len)| Block { offset, len });
    }
}
