//! 字节存储层 - 纯数据管理
//! Byte Store - Pure data management
//!
//! 职责：
//! - 持有一个流当前物化的字节窗口
//! - 在尾部追加、在任意偏移插入、向前滑动窗口
//! - 不维护块元数据，由上层在写入后更新
//!
//! ```text
//! stream_offset            buf_offset          stream_offset + capacity
//! ^                        ^                   ^
//! +------------------------+-------------------+
//! |         data           |   zeroed space    |
//! +------------------------+-------------------+
//! ```

use crate::{
    config::BufferConfig,
    error::{Error, Result},
    pool::ArenaPool,
};
use std::sync::Arc;
use tracing::{trace, warn};

/// A range of the stream written by one call, in absolute stream offsets.
///
/// 一次写入所覆盖的流范围（绝对偏移）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferSegment {
    /// Absolute offset of the first byte.
    /// 第一个字节的绝对偏移。
    pub offset: u64,
    /// Number of bytes.
    /// 字节数。
    pub len: u32,
}

impl BufferSegment {
    /// One past the last byte.
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.len)
    }
}

/// Where a write landed, reported so block metadata can be updated.
///
/// 写入位置信息，供上层更新块元数据。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Offset of the write relative to the window start.
    pub rel_offset: usize,
    /// Logical tail just before the bytes were copied.
    pub prev_tail: usize,
    /// The window slid forward to make room.
    pub slid: bool,
}

/// Growable byte arena with a sliding window.
///
/// 带滑动窗口的可增长字节区。
#[derive(Debug)]
pub struct ByteStore {
    config: BufferConfig,
    pool: Option<Arc<ArenaPool>>,
    /// Absolute offset of `buf[0]`.
    stream_offset: u64,
    /// Backing arena. Its length is the arena size; bytes at or past
    /// `buf_offset` are always zero.
    buf: Vec<u8>,
    /// Logical tail, relative to `stream_offset`.
    buf_offset: usize,
}

impl ByteStore {
    /// 创建新的字节存储
    /// Create new byte store
    pub fn new(config: BufferConfig) -> Self {
        Self {
            config,
            pool: None,
            stream_offset: 0,
            buf: Vec::new(),
            buf_offset: 0,
        }
    }

    /// 创建从对象池获取字节区的字节存储
    /// Create byte store that draws its arena from a pool
    pub fn with_pool(config: BufferConfig, pool: Arc<ArenaPool>) -> Self {
        let mut store = Self::new(config);
        store.pool = Some(pool);
        store
    }

    /// 窗口起点的绝对偏移
    /// Absolute offset of the window start
    pub fn stream_offset(&self) -> u64 {
        self.stream_offset
    }

    /// Logical tail relative to the window start.
    pub fn buf_offset(&self) -> usize {
        self.buf_offset
    }

    /// Absolute offset one past the last materialized byte.
    pub fn tail_offset(&self) -> u64 {
        self.stream_offset + self.buf_offset as u64
    }

    /// Current arena size in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// 在尾部追加数据，返回分配到的绝对偏移
    /// Append data at the tail, returning the absolute offset assigned
    ///
    /// The arena grows before any automatic slide, so a failed growth leaves
    /// the window untouched.
    pub fn append(&mut self, data: &[u8]) -> Result<(BufferSegment, Placement)> {
        let len = segment_len(data)?;
        self.init()?;

        let mut slide = 0;
        if !self.fits(self.buf_offset, data.len()) {
            slide = self.auto_slide_amount(self.tail_offset());
            let needed = self.buf_offset - slide + data.len();
            if self.buf.is_empty() {
                self.grow_to_size(needed)?;
            } else if needed > self.buf.len() {
                self.grow_doubling(needed)?;
            }
        }
        let slid = self.apply_slide(slide);

        let rel_offset = self.buf_offset;
        self.buf[rel_offset..rel_offset + data.len()].copy_from_slice(data);
        self.buf_offset += data.len();

        let segment = BufferSegment {
            offset: self.stream_offset + rel_offset as u64,
            len,
        };
        trace!(offset = segment.offset, len, "Appended data to byte store");
        Ok((
            segment,
            Placement {
                rel_offset,
                prev_tail: rel_offset,
                slid,
            },
        ))
    }

    /// 在指定绝对偏移处写入数据，必要时扩容
    /// Write data at an absolute offset, growing the arena if needed
    pub fn insert_at(&mut self, data: &[u8], offset: u64) -> Result<(BufferSegment, Placement)> {
        if offset < self.stream_offset {
            return Err(Error::OffsetBeforeWindow {
                offset,
                window_start: self.stream_offset,
            });
        }
        let len = segment_len(data)?;
        self.init()?;

        let rel_offset = self.relative(offset)?;
        let mut slide = 0;
        if !self.fits(rel_offset, data.len()) {
            slide = self.auto_slide_amount(offset);
            let needed = rel_offset - slide + data.len();
            if needed > self.buf.len() {
                self.grow_to_size(needed)?;
            }
        }
        let slid = self.apply_slide(slide);
        let rel_offset = rel_offset - slide;

        let prev_tail = self.buf_offset;
        self.buf[rel_offset..rel_offset + data.len()].copy_from_slice(data);
        if rel_offset + data.len() > self.buf_offset {
            self.buf_offset = rel_offset + data.len();
        }

        trace!(
            offset,
            len,
            stream_offset = self.stream_offset,
            buf_offset = self.buf_offset,
            "Inserted data into byte store"
        );
        Ok((
            BufferSegment { offset, len },
            Placement {
                rel_offset,
                prev_tail,
                slid,
            },
        ))
    }

    /// 滑动窗口到绝对偏移，返回滑动的字节数
    /// Slide the window to an absolute offset, returning the slide amount
    ///
    /// Sliding past the tail discards every byte and moves the window start
    /// to `offset`.
    pub fn slide_to_offset(&mut self, offset: u64) -> u64 {
        if offset <= self.stream_offset {
            return 0;
        }
        let slide = offset - self.stream_offset;
        if offset >= self.tail_offset() {
            self.buf[..self.buf_offset].fill(0);
            self.buf_offset = 0;
        } else {
            // `slide < buf_offset` here, so it fits in usize.
            let slide = slide as usize;
            let old_tail = self.buf_offset;
            self.buf.copy_within(slide..old_tail, 0);
            self.buf_offset = old_tail - slide;
            // Stale bytes past the new tail must read as zero.
            self.buf[self.buf_offset..old_tail].fill(0);
        }
        self.stream_offset = offset;
        trace!(slide, stream_offset = self.stream_offset, buf_offset = self.buf_offset, "Slid byte store window");
        slide
    }

    /// The whole materialized window.
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.buf_offset]
    }

    /// Bytes of `[offset, offset + len)` that are still inside the window.
    /// A range that starts before the window is clipped to the window start.
    ///
    /// 返回 `[offset, offset + len)` 中仍在窗口内的字节。起点在窗口之前的范围会被裁剪。
    pub fn range(&self, offset: u64, len: u64) -> Option<&[u8]> {
        let end = offset + len;
        let start = offset.max(self.stream_offset);
        let end = end.min(self.tail_offset());
        if start >= end {
            return None;
        }
        let from = (start - self.stream_offset) as usize;
        let to = (end - self.stream_offset) as usize;
        Some(&self.buf[from..to])
    }

    /// 丢弃所有数据并归还字节区
    /// Discard all data and give the arena back
    pub fn clear(&mut self) {
        self.stream_offset = self.tail_offset();
        self.buf_offset = 0;
        let arena = std::mem::take(&mut self.buf);
        if let Some(pool) = &self.pool {
            pool.release(arena);
        }
    }

    fn init(&mut self) -> Result<()> {
        if self.buf.is_empty() && self.config.buf_size > 0 {
            self.resize_arena(self.config.buf_size)?;
        }
        Ok(())
    }

    fn fits(&self, rel_offset: usize, len: usize) -> bool {
        rel_offset + len <= self.buf.len()
    }

    fn relative(&self, offset: u64) -> Result<usize> {
        usize::try_from(offset - self.stream_offset).map_err(|_| Error::AllocationFailure {
            requested: usize::MAX,
        })
    }

    /// How far an automatic slide moves the window: keeps `buf_slide` bytes,
    /// never slides past `limit`.
    fn auto_slide_amount(&self, limit: u64) -> usize {
        if !self.config.auto_slide || self.buf_offset <= self.config.buf_slide {
            return 0;
        }
        let target = (self.tail_offset() - self.config.buf_slide as u64).min(limit);
        // `target` never passes the tail, so the distance fits in usize.
        target.saturating_sub(self.stream_offset) as usize
    }

    fn apply_slide(&mut self, slide: usize) -> bool {
        slide > 0 && self.slide_to_offset(self.stream_offset + slide as u64) > 0
    }

    /// Grows to the next multiple of `buf_size` that holds `size` bytes.
    fn grow_to_size(&mut self, size: usize) -> Result<()> {
        let chunk = self.config.buf_size;
        let grow = if chunk > 0 { size - size % chunk + chunk } else { size };
        self.resize_arena(grow)
    }

    /// Doubles the arena until it holds `size` bytes.
    fn grow_doubling(&mut self, size: usize) -> Result<()> {
        let mut grow = self.buf.len();
        while grow < size {
            grow = grow.saturating_mul(2);
        }
        self.resize_arena(grow)
    }

    fn resize_arena(&mut self, size: usize) -> Result<()> {
        if self.config.max_size > 0 && size > self.config.max_size {
            warn!(requested = size, max_size = self.config.max_size, "Byte store would exceed its memory cap");
            return Err(Error::AllocationFailure { requested: size });
        }
        if self.buf.capacity() == 0 {
            if let Some(pool) = &self.pool {
                self.buf = pool.acquire();
            }
        }
        let additional = size.saturating_sub(self.buf.len());
        if self.buf.try_reserve_exact(additional).is_err() {
            warn!(requested = size, "Byte store allocation failed");
            return Err(Error::AllocationFailure { requested: size });
        }
        self.buf.resize(size, 0);
        trace!(size, "Grew byte store arena");
        Ok(())
    }
}

impl Drop for ByteStore {
    fn drop(&mut self) {
        if let Some(pool) = &self.pool {
            pool.release(std::mem::take(&mut self.buf));
        }
    }
}

fn segment_len(data: &[u8]) -> Result<u32> {
    u32::try_from(data.len()).map_err(|_| Error::AllocationFailure {
        requested: data.len(),
    })
}
