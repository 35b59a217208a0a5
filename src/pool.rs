//! 字节区对象池
//! Byte arena object pool
//!
//! 在多个流之间复用已分配的字节区，减少分配开销。
//! Reuses allocated byte arenas across streams to cut allocation overhead.

use crossbeam_queue::SegQueue;

/// 池配置
/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// 池中最多保留的字节区数量
    /// Maximum number of arenas kept in the pool
    pub max_arenas: usize,
    /// 超过此容量的字节区不会被回收
    /// Arenas with a larger capacity are not recycled
    pub max_arena_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_arenas: 1024,
            max_arena_capacity: 64 * 1024,
        }
    }
}

/// 字节区对象池
/// Byte arena pool
///
/// The pool is lock-free and can be shared by every worker through an `Arc`.
/// An acquired arena is always empty; the caller sizes and zero-fills it.
#[derive(Debug)]
pub struct ArenaPool {
    arenas: SegQueue<Vec<u8>>,
    config: PoolConfig,
}

impl ArenaPool {
    /// 创建新的对象池
    /// Create new pool
    pub fn new(config: PoolConfig) -> Self {
        Self {
            arenas: SegQueue::new(),
            config,
        }
    }

    /// 从池中获取字节区
    /// Acquire arena from pool
    pub fn acquire(&self) -> Vec<u8> {
        match self.arenas.pop() {
            Some(mut arena) => {
                arena.clear();
                arena
            }
            None => Vec::new(),
        }
    }

    /// 释放字节区到池中
    /// Release arena to pool
    pub fn release(&self, arena: Vec<u8>) {
        if arena.capacity() == 0 || arena.capacity() > self.config.max_arena_capacity {
            return;
        }
        if self.arenas.len() < self.config.max_arenas {
            self.arenas.push(arena);
        }
    }

    /// 池中当前可用的字节区数量
    /// Number of arenas currently pooled
    pub fn available(&self) -> usize {
        self.arenas.len()
    }
}

impl Default for ArenaPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}
