//! 流式字节缓冲区：字节存储加块索引。
//! Streaming byte buffer: a byte store plus a block index.
//!
//! `ByteStore` owns the bytes and the window, `BlockIndex` records which parts
//! of the window are backed by data. Every write goes through
//! `StreamingBuffer` so the two never disagree.

pub mod blocks;
pub mod store;


pub use blocks::{Block, BlockIndex, Window};
pub use store::{BufferSegment, ByteStore, Placement};

use crate::{config::BufferConfig, error::Result, pool::ArenaPool};
use std::sync::Arc;

/// 流式字节缓冲区
/// Streaming byte buffer
#[derive(Debug)]
pub struct StreamingBuffer {
    store: ByteStore,
    blocks: BlockIndex,
}

impl StreamingBuffer {
    /// 创建新的缓冲区
    /// Create new buffer
    pub fn new(config: BufferConfig) -> Self {
        Self {
            store: ByteStore::new(config),
            blocks: BlockIndex::new(),
        }
    }

    /// 创建从对象池获取字节区的缓冲区
    /// Create buffer backed by a pooled arena
    pub fn with_pool(config: BufferConfig, pool: Arc<ArenaPool>) -> Self {
        Self {
            store: ByteStore::with_pool(config, pool),
            blocks: BlockIndex::new(),
        }
    }

    /// 在尾部追加数据
    /// Append data at the tail
    pub fn append(&mut self, data: &[u8]) -> Result<BufferSegment> {
        let (segment, placement) = self.store.append(data)?;
        self.record(placement, data.len());
        Ok(segment)
    }

    /// 在绝对偏移处写入数据
    /// Write data at an absolute offset
    pub fn insert_at(&mut self, data: &[u8], offset: u64) -> Result<BufferSegment> {
        let (segment, placement) = self.store.insert_at(data, offset)?;
        self.record(placement, data.len());
        Ok(segment)
    }

    fn record(&mut self, placement: Placement, len: usize) {
        if placement.slid {
            self.blocks.prune_to(self.store.stream_offset());
        }
        let window = Window {
            stream_offset: self.store.stream_offset(),
            tail: placement.prev_tail,
        };
        self.blocks.update(window, placement.rel_offset, len);
    }

    /// 滑动窗口到绝对偏移，返回滑动的字节数
    /// Slide the window to an absolute offset, returning the slide amount
    pub fn slide_to_offset(&mut self, offset: u64) -> u64 {
        let slide = self.store.slide_to_offset(offset);
        if slide > 0 {
            self.blocks.prune_to(self.store.stream_offset());
        }
        slide
    }

    /// Slide the window forward by `n` bytes.
    pub fn slide(&mut self, n: u64) -> u64 {
        self.slide_to_offset(self.store.stream_offset() + n)
    }

    /// Materialized bytes from `offset` to the end of the block holding it.
    /// `None` if `offset` falls in a gap or outside the window.
    ///
    /// 返回从 `offset` 到所在块末尾的已物化字节。落在空洞或窗口之外时返回 `None`。
    pub fn get_data_at(&self, offset: u64) -> Option<&[u8]> {
        let block = self.blocks_from(offset).next().filter(|b| b.contains(offset))?;
        self.store.range(offset, block.end() - offset)
    }

    /// The whole window, gaps included as zero bytes.
    pub fn get_data(&self) -> &[u8] {
        self.store.data()
    }

    /// Bytes of a previously written segment that are still in the window.
    pub fn segment_data(&self, segment: &BufferSegment) -> Option<&[u8]> {
        self.store.range(segment.offset, u64::from(segment.len))
    }

    /// Compares a segment's stored bytes with `data`. A segment partly before
    /// the window never compares equal.
    pub fn compare_segment(&self, segment: &BufferSegment, data: &[u8]) -> bool {
        segment.offset >= self.store.stream_offset() && self.segment_data(segment) == Some(data)
    }

    /// The segment ends at or before the window start.
    pub fn is_before_window(&self, segment: &BufferSegment) -> bool {
        segment.end() <= self.store.stream_offset()
    }

    /// Data blocks ending after `offset`, lowest first. A gap-free window is
    /// reported as one block.
    pub fn blocks_from(&self, offset: u64) -> impl Iterator<Item = Block> + '_ {
        let implicit = if self.blocks.is_empty() {
            self.implicit_block().filter(|b| b.end() > offset)
        } else {
            None
        };
        implicit.into_iter().chain(self.blocks.range_from(offset))
    }

    /// The lowest data block.
    pub fn head_block(&self) -> Option<Block> {
        self.blocks.head().or_else(|| self.implicit_block())
    }

    fn implicit_block(&self) -> Option<Block> {
        let len = self.store.buf_offset() as u64;
        (len > 0).then(|| Block {
            offset: self.store.stream_offset(),
            len,
        })
    }

    /// The explicit block index. Empty while the window has no gaps.
    pub fn block_index(&self) -> &BlockIndex {
        &self.blocks
    }

    /// 丢弃全部数据
    /// Discard all data
    pub fn clear(&mut self) {
        self.store.clear();
        self.blocks.clear();
    }

    /// 窗口起点的绝对偏移
    /// Absolute offset of the window start
    pub fn stream_offset(&self) -> u64 {
        self.store.stream_offset()
    }

    /// Absolute offset one past the last materialized byte.
    pub fn tail_offset(&self) -> u64 {
        self.store.tail_offset()
    }

    /// 相对窗口起点的逻辑尾部
    /// Logical tail relative to the window start
    pub fn buf_offset(&self) -> usize {
        self.store.buf_offset()
    }

    /// 字节区大小
    /// Arena size in bytes
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }
}
