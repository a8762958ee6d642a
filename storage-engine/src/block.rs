//! Block layout shared by row and column segment files.
//!
//! A segment file is a sequence of blocks up to the committed end of file:
//!
//! ```text
//! +-------+-------+-------+-----------+------------------+------------+-----------+
//! | magic | codec | flags | row_count | uncompressed_len | stored_len | payload   |
//! | u16   | u8    | u8    | u32       | u32              | u32        | stored_len|
//! +-------+-------+-------+-----------+------------------+------------+-----------+
//! ```
//!
//! The payload is compressed with the relation's codec unless compression
//! would not shrink it, in which case it is stored raw with codec `none`.

use crate::error::{Result, StorageError};
use crate::options::StorageOptions;
use common::api::{RelationId, SegmentNumber};
use common::disk_manager::SegmentFile;
use compressed_stream::BackendKind;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};
use tracing::{trace, warn};

pub const BLOCK_HEADER_SIZE: usize = 16;

const BLOCK_MAGIC: u16 = 0xA0B1;

/// Identifies the segment a block belongs to, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentId {
    pub rel_id: RelationId,
    pub segno: SegmentNumber,
}

impl SegmentId {
    pub fn corrupt(&self, detail: impl Into<String>) -> StorageError {
        let detail = detail.into();
        warn!(rel_id = self.rel_id, segno = self.segno, %detail, "corrupt append-only block");
        StorageError::Corrupt {
            rel_id: self.rel_id,
            segno: self.segno,
            detail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub codec: BackendKind,
    pub row_count: u32,
    pub uncompressed_len: u32,
    pub stored_len: u32,
}

impl BlockHeader {
    pub fn encode(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut raw = [0u8; BLOCK_HEADER_SIZE];
        raw[0..2].copy_from_slice(&BLOCK_MAGIC.to_le_bytes());
        raw[2] = codec_tag(self.codec);
        raw[4..8].copy_from_slice(&self.row_count.to_le_bytes());
        raw[8..12].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        raw[12..16].copy_from_slice(&self.stored_len.to_le_bytes());
        raw
    }

    pub fn decode(raw: &[u8; BLOCK_HEADER_SIZE]) -> std::result::Result<Self, String> {
        let magic = u16::from_le_bytes([raw[0], raw[1]]);
        if magic != BLOCK_MAGIC {
            return Err(format!("bad block magic {:#06x}", magic));
        }
        let codec = match raw[2] {
            0 => BackendKind::None,
            1 => BackendKind::Zlib,
            2 => BackendKind::Zstd,
            3 => BackendKind::Lz4,
            tag => return Err(format!("unknown codec tag {}", tag)),
        };
        let word = |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        Ok(Self {
            codec,
            row_count: word(4),
            uncompressed_len: word(8),
            stored_len: word(12),
        })
    }

    pub fn total_len(&self) -> u64 {
        BLOCK_HEADER_SIZE as u64 + self.stored_len as u64
    }
}

fn codec_tag(kind: BackendKind) -> u8 {
    match kind {
        BackendKind::None => 0,
        BackendKind::Zlib => 1,
        BackendKind::Zstd => 2,
        BackendKind::Lz4 => 3,
    }
}

/// Compresses `payload`, falling back to raw storage when it does not shrink.
pub fn compress_payload(kind: BackendKind, level: u32, payload: &[u8]) -> io::Result<(BackendKind, Vec<u8>)> {
    let compressed = match kind {
        BackendKind::None => return Ok((BackendKind::None, payload.to_vec())),
        BackendKind::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::with_capacity(payload.len() / 2), Compression::new(level));
            encoder.write_all(payload)?;
            encoder.finish()?
        }
        BackendKind::Zstd => zstd::bulk::compress(payload, level as i32)?,
        BackendKind::Lz4 => lz4_flex::block::compress(payload),
    };
    if compressed.len() >= payload.len() {
        Ok((BackendKind::None, payload.to_vec()))
    } else {
        Ok((kind, compressed))
    }
}

/// Decompresses a stored payload and checks it has the recorded length.
pub fn decompress_payload(
    segment: SegmentId,
    block_no: usize,
    header: &BlockHeader,
    stored: Vec<u8>,
) -> Result<Vec<u8>> {
    let expected = header.uncompressed_len as usize;
    let payload = match header.codec {
        BackendKind::None => stored,
        BackendKind::Zlib => {
            let mut out = Vec::with_capacity(expected);
            ZlibDecoder::new(stored.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| segment.corrupt(format!("zlib decompression of block {} failed: {}", block_no, e)))?;
            out
        }
        BackendKind::Zstd => zstd::bulk::decompress(&stored, expected)
            .map_err(|e| segment.corrupt(format!("zstd decompression of block {} failed: {}", block_no, e)))?,
        BackendKind::Lz4 => lz4_flex::block::decompress(&stored, expected)
            .map_err(|e| segment.corrupt(format!("lz4 decompression of block {} failed: {}", block_no, e)))?,
    };
    if payload.len() != expected {
        return Err(segment.corrupt(format!(
            "uncompress returned length {} which is different than the expected length {} (block count {})",
            payload.len(),
            expected,
            block_no
        )));
    }
    Ok(payload)
}

/// Where a block lives and which rows it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub offset: u64,
    pub header: BlockHeader,
    /// Row number of the block's first row within its segment.
    pub first_row: u64,
}

/// Reads the block headers of `file` up to `eof`, without touching payloads.
pub fn read_block_index(file: &SegmentFile, segment: SegmentId, eof: u64) -> Result<Vec<BlockRef>> {
    let mut blocks = Vec::new();
    let mut offset = 0;
    let mut next_row = 0;
    while offset < eof {
        if offset + BLOCK_HEADER_SIZE as u64 > eof {
            return Err(segment.corrupt(format!("truncated block header at offset {}", offset)));
        }
        let mut raw = [0u8; BLOCK_HEADER_SIZE];
        file.read_at(offset, &mut raw)?;
        let header = BlockHeader::decode(&raw)
            .map_err(|detail| segment.corrupt(format!("{} at offset {}", detail, offset)))?;
        if offset + header.total_len() > eof {
            return Err(segment.corrupt(format!(
                "block at offset {} extends past end of file {}",
                offset, eof
            )));
        }
        blocks.push(BlockRef {
            offset,
            header,
            first_row: next_row,
        });
        next_row += header.row_count as u64;
        offset += header.total_len();
    }
    trace!(rel_id = segment.rel_id, segno = segment.segno, blocks = blocks.len(), "read block index");
    Ok(blocks)
}

/// Reads and decompresses the payload of one block.
pub fn read_block_payload(file: &SegmentFile, segment: SegmentId, block_no: usize, block: &BlockRef) -> Result<Vec<u8>> {
    let mut stored = vec![0u8; block.header.stored_len as usize];
    file.read_at(block.offset + BLOCK_HEADER_SIZE as u64, &mut stored)?;
    decompress_payload(segment, block_no, &block.header, stored)
}

/// Buffers rows into blocks and appends them to a segment file.
#[derive(Debug)]
pub struct BlockWriter {
    file: SegmentFile,
    offset: u64,
    options: StorageOptions,
    payload: Vec<u8>,
    row_count: u32,
    blocks_written: usize,
}

impl BlockWriter {
    /// Starts writing at `eof`, the committed end of `file`. Anything past it
    /// was left by an aborted writer and is overwritten.
    pub fn new(file: SegmentFile, eof: u64, options: StorageOptions) -> Self {
        Self {
            file,
            offset: eof,
            options,
            payload: Vec::with_capacity(options.block_size),
            row_count: 0,
            blocks_written: 0,
        }
    }

    /// Appends one row's encoded bytes, starting a new block when the current
    /// one would exceed the block size. A row larger than the block size gets
    /// a block of its own.
    pub fn append_row(&mut self, record: &[u8]) -> Result<()> {
        if self.row_count > 0 && self.payload.len() + record.len() > self.options.block_size {
            self.flush_block()?;
        }
        self.payload.extend_from_slice(record);
        self.row_count += 1;
        Ok(())
    }

    pub fn flush_block(&mut self) -> Result<()> {
        if self.row_count == 0 {
            return Ok(());
        }
        let spec = self.options.compression;
        let (codec, stored) = compress_payload(spec.kind, spec.level, &self.payload)?;
        let header = BlockHeader {
            codec,
            row_count: self.row_count,
            uncompressed_len: self.payload.len() as u32,
            stored_len: stored.len() as u32,
        };
        self.file.write_at(self.offset, &header.encode())?;
        self.file.write_at(self.offset + BLOCK_HEADER_SIZE as u64, &stored)?;
        self.offset += header.total_len();
        self.blocks_written += 1;
        self.payload.clear();
        self.row_count = 0;
        Ok(())
    }

    pub fn blocks_written(&self) -> usize {
        self.blocks_written
    }

    /// Flushes the last block and syncs the file, returning the new end of file.
    pub fn finish(mut self) -> Result<u64> {
        self.flush_block()?;
        self.file.sync()?;
        Ok(self.offset)
    }
}
