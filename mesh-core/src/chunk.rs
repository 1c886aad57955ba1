//! Chunk codec for peer file transfers.
//!
//! Splits an opaque byte buffer into ordered, bounded-size chunks and
//! reassembles them. Reassembly is all-or-nothing: it either returns the
//! exact original bytes or an error, never a partial buffer.

use mesh_types::ErrorKind;

/// Default chunk size: 16 KiB, small enough for any data channel message.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// One ordered fragment of a larger buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position in the original buffer.
    pub index: u32,
    /// Fragment bytes. Every chunk except the last is exactly the chunk size.
    pub payload: Vec<u8>,
}

/// Error type for codec operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Chunk size was zero or the buffer needs more than `u32::MAX` chunks.
    InvalidArgument(String),
    /// The chunk set is not exactly indices `0..expected`.
    IncompleteTransfer {
        /// Declared chunk count.
        expected: u32,
        /// Usable chunks received.
        received: u32,
    },
    /// Concatenated length differs from the declared size.
    SizeMismatch {
        /// Declared total size.
        expected: u64,
        /// Reassembled size.
        actual: u64,
    },
}

impl CodecError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CodecError::IncompleteTransfer { .. } => ErrorKind::IncompleteTransfer,
            CodecError::SizeMismatch { .. } => ErrorKind::SizeMismatch,
        }
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            CodecError::IncompleteTransfer { expected, received } => {
                write!(
                    f,
                    "incomplete transfer: expected {} chunks, received {}",
                    expected, received
                )
            }
            CodecError::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {} bytes, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for CodecError {}

/// Number of chunks needed for `len` bytes: `ceil(len / chunk_size)`.
pub fn chunk_count(len: usize, chunk_size: usize) -> Result<u32, CodecError> {
    if chunk_size == 0 {
        return Err(CodecError::InvalidArgument(
            "chunk size must be greater than zero".into(),
        ));
    }
    let count = len.div_ceil(chunk_size);
    u32::try_from(count).map_err(|_| {
        CodecError::InvalidArgument(format!("{} chunks exceeds the u32 index range", count))
    })
}

/// Split `bytes` into chunks of at most `chunk_size` bytes.
///
/// An empty buffer yields no chunks.
pub fn split(bytes: &[u8], chunk_size: usize) -> Result<Vec<Chunk>, CodecError> {
    chunk_count(bytes.len(), chunk_size)?;

    Ok(bytes
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, payload)| Chunk {
            index: index as u32,
            payload: payload.to_vec(),
        })
        .collect())
}

/// Reassemble chunks into the original buffer.
///
/// Chunks are sorted by index first, so arrival order does not matter.
/// Fails with `IncompleteTransfer` unless the indices are exactly
/// `0..expected_count`, and with `SizeMismatch` unless the concatenation is
/// `expected_total_bytes` long.
pub fn reassemble(
    mut chunks: Vec<Chunk>,
    expected_count: u32,
    expected_total_bytes: u64,
) -> Result<Vec<u8>, CodecError> {
    if chunks.len() != expected_count as usize {
        return Err(CodecError::IncompleteTransfer {
            expected: expected_count,
            received: chunks.len().min(u32::MAX as usize) as u32,
        });
    }

    chunks.sort_by_key(|c| c.index);

    // Right count but duplicate or out-of-range indices.
    if chunks.iter().enumerate().any(|(i, c)| c.index as usize != i) {
        let mut distinct: Vec<u32> = chunks
            .iter()
            .map(|c| c.index)
            .filter(|i| *i < expected_count)
            .collect();
        distinct.dedup();
        return Err(CodecError::IncompleteTransfer {
            expected: expected_count,
            received: distinct.len() as u32,
        });
    }

    let actual: u64 = chunks.iter().map(|c| c.payload.len() as u64).sum();
    if actual != expected_total_bytes {
        return Err(CodecError::SizeMismatch {
            expected: expected_total_bytes,
            actual,
        });
    }

    let mut bytes = Vec::with_capacity(actual as usize);
    for chunk in chunks {
        bytes.extend_from_slice(&chunk.payload);
    }
    Ok(bytes)
}
