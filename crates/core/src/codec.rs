//! Chunk codec: splits payloads into fixed-size chunks and joins them back.
//!
//! Stored chunks carry their bytes as base64 text. The chunk size is fixed
//! per deployment, never per call, so a blob is never cut two ways.

use base64::{Engine, engine::general_purpose::STANDARD};
use blobhub_common::{AppError, AppResult};
use blobhub_db::entities::ChunkDoc;
use bytes::{Bytes, BytesMut};

/// Splits and reassembles payloads at a fixed chunk size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCodec {
    chunk_size: usize,
}

impl ChunkCodec {
    /// Codec for `chunk_size` byte chunks (clamped to at least 1).
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Chunk size in bytes.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks for a payload of `size_bytes`.
    #[must_use]
    pub fn chunk_count(&self, size_bytes: u64) -> u32 {
        let count = size_bytes.div_ceil(self.chunk_size as u64);
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Exact length chunk `index` must have in a payload of `size_bytes`.
    #[must_use]
    pub fn expected_len(&self, size_bytes: u64, index: u32) -> usize {
        let start = u64::from(index) * self.chunk_size as u64;
        let remaining = size_bytes.saturating_sub(start);
        remaining.min(self.chunk_size as u64) as usize
    }

    /// Split a payload into ordered chunks. Only the last may be short.
    #[must_use]
    pub fn split(&self, payload: &[u8]) -> Vec<Bytes> {
        payload
            .chunks(self.chunk_size)
            .map(Bytes::copy_from_slice)
            .collect()
    }

    /// Storable form of one chunk.
    #[must_use]
    pub fn encode(&self, index: u32, payload: &[u8]) -> ChunkDoc {
        ChunkDoc {
            index,
            data_base64: STANDARD.encode(payload),
        }
    }

    /// Raw bytes of a stored chunk.
    pub fn decode(&self, chunk: &ChunkDoc) -> AppResult<Bytes> {
        STANDARD
            .decode(chunk.data_base64.as_bytes())
            .map(Bytes::from)
            .map_err(|e| AppError::CorruptData(format!("chunk {}: {e}", chunk.index)))
    }

    /// Reassemble a payload from stored chunks.
    ///
    /// `chunks` may arrive in any order. Every index in `0..chunk_count`
    /// must be present, and the decoded total must equal `size_bytes`.
    pub fn join(&self, chunk_count: u32, size_bytes: u64, chunks: &[ChunkDoc]) -> AppResult<Bytes> {
        let mut ordered: Vec<Option<&ChunkDoc>> = vec![None; chunk_count as usize];
        for chunk in chunks {
            if let Some(slot) = ordered.get_mut(chunk.index as usize) {
                *slot = Some(chunk);
            }
        }

        let mut out = BytesMut::with_capacity(size_bytes as usize);
        for (index, slot) in ordered.into_iter().enumerate() {
            let chunk = slot.ok_or(AppError::IncompleteData {
                missing: index as u32,
                expected: chunk_count,
            })?;
            out.extend_from_slice(&self.decode(chunk)?);
        }

        if out.len() as u64 != size_bytes {
            return Err(AppError::CorruptData(format!(
                "reassembled {} bytes, expected {size_bytes}",
                out.len()
            )));
        }
        Ok(out.freeze())
    }
}
