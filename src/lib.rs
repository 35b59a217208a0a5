#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the TCP stream reassembly library.
//! TCP 流重组库的根。
//!
//! Segments arrive out of order, duplicated and overlapping. Each
//! [`Stream`] places them into a sliding [`StreamingBuffer`] at their
//! stream offset, resolves conflicting overlaps per [`OsPolicy`], and lets
//! consumers read contiguous data and prune what they are done with.

pub mod buffer;
pub mod config;
pub mod error;
pub mod overlap;
pub mod pool;
pub mod segment;
pub mod seq;
pub mod stream;

pub use buffer::{Block, BufferSegment, StreamingBuffer};
pub use config::{BufferConfig, Config, ReassemblyConfig};
pub use error::{Error, Result};
pub use overlap::{OsPolicy, OverlapKind, OverlapResolver};
pub use pool::{ArenaPool, PoolConfig};
pub use segment::{InsertOutcome, Segment, SegmentIndex};
pub use stream::{
    ConsumerFlags, Direction, Disposition, InsertReport, Stream, StreamEvent, StreamFlags,
    StreamStats,
};
