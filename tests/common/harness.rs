//! tests/common/harness.rs
use rand::{Rng, rngs::StdRng};
use std::sync::Once;
use tcp_reassembly::{Block, Stream};

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "tcp_reassembly=debug,reassembly=info".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// A byte-level model of what the stream should hold.
///
/// 流应持有内容的逐字节模型。
pub struct StreamModel {
    bytes: Vec<Option<u8>>,
}

/// Which writer owns an overlapping byte in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    First,
    Last,
}

impl StreamModel {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![None; size],
        }
    }

    pub fn write(&mut self, offset: usize, data: &[u8], winner: Winner) {
        for (slot, &byte) in self.bytes[offset..offset + data.len()].iter_mut().zip(data) {
            if winner == Winner::Last || slot.is_none() {
                *slot = Some(byte);
            }
        }
    }

    /// Forgets every byte before `offset`, as a slide does.
    pub fn discard_before(&mut self, offset: u64) {
        let end = (offset as usize).min(self.bytes.len());
        self.bytes[..end].fill(None);
    }

    /// Maximal runs of known bytes as blocks.
    pub fn blocks(&self) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut start = None;
        for (i, byte) in self.bytes.iter().enumerate() {
            match (byte, start) {
                (Some(_), None) => start = Some(i),
                (None, Some(s)) => {
                    blocks.push(block(s, i));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            blocks.push(block(s, self.bytes.len()));
        }
        blocks
    }

    pub fn run(&self, block: &Block) -> Vec<u8> {
        self.bytes[block.offset as usize..block.end() as usize]
            .iter()
            .map(|b| b.unwrap_or_default())
            .collect()
    }
}

fn block(start: usize, end: usize) -> Block {
    Block {
        offset: start as u64,
        len: (end - start) as u64,
    }
}

/// A random payload of `1..=max_len` bytes placed somewhere in `0..size`.
pub fn random_segment(rng: &mut StdRng, size: usize, max_len: usize) -> (usize, Vec<u8>) {
    let len = rng.random_range(1..=max_len);
    let offset = rng.random_range(0..=size - len);
    let data = (0..len).map(|_| rng.random()).collect();
    (offset, data)
}

/// Asserts that the stream's blocks and bytes match the model.
pub fn assert_matches_model(stream: &Stream, model: &StreamModel) {
    let blocks: Vec<Block> = stream.buffer().blocks_from(0).collect();
    assert_eq!(blocks, model.blocks());

    if let Some(first) = blocks.first() {
        assert!(
            first.offset >= stream.stream_offset(),
            "block {first:?} before window start {}",
            stream.stream_offset()
        );
    }
    for pair in blocks.windows(2) {
        assert!(pair[0].end() < pair[1].offset, "blocks touch: {pair:?}");
    }

    for block in &blocks {
        let data = stream.buffer().get_data_at(block.offset).unwrap_or_default();
        assert_eq!(data, &model.run(block)[..], "bytes differ in {block:?}");
    }
}
