//! Inbound transfer buffer for EduMesh.
//!
//! Peer messages for several files may interleave on one channel, so
//! chunks are demultiplexed by `fileId` into per-transfer buffers. A
//! `fileComplete` frame triggers reassembly; the transfer's buffer is
//! dropped whether reassembly succeeds or fails, so memory stays bounded
//! by the transfers currently in flight.

use std::collections::HashMap;
use std::fmt;

use mesh_types::{FileChunk, FileComplete, FileId, FileStart, PeerMessage};

use crate::chunk::{reassemble, Chunk, CodecError};

/// A fully reassembled incoming file.
#[derive(Clone, PartialEq, Eq)]
pub struct CompletedTransfer {
    /// Transfer id, reused as the file id.
    pub file_id: FileId,
    /// File name.
    pub file_name: String,
    /// MIME type.
    pub file_type: String,
    /// Reconstructed contents; length equals the declared size.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for CompletedTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletedTransfer")
            .field("file_id", &self.file_id)
            .field("file_name", &self.file_name)
            .field("file_type", &self.file_type)
            .field("bytes", &format!("[{} bytes REDACTED]", self.bytes.len()))
            .finish()
    }
}

/// What happened after feeding one message to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The message was buffered; the transfer is still open.
    Buffered,
    /// The transfer completed and reassembled cleanly.
    Completed(CompletedTransfer),
    /// The transfer completed but failed integrity checks and was discarded.
    Failed {
        /// The discarded transfer.
        file_id: FileId,
        /// Why reassembly failed.
        error: CodecError,
    },
}

#[derive(Debug, Default)]
struct PendingTransfer {
    /// Chunk count announced by `fileStart`, else by the first chunk.
    expected_chunks: Option<u32>,
    chunks: Vec<Chunk>,
    buffered_bytes: u64,
}

/// Per-session buffer of partially received transfers.
#[derive(Debug, Default)]
pub struct TransferBuffer {
    pending: HashMap<FileId, PendingTransfer>,
}

impl TransferBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one inbound message.
    pub fn accept(&mut self, message: PeerMessage) -> TransferOutcome {
        match message {
            PeerMessage::FileStart(start) => {
                self.start(start);
                TransferOutcome::Buffered
            }
            PeerMessage::File(chunk) => {
                self.chunk(chunk);
                TransferOutcome::Buffered
            }
            PeerMessage::FileComplete(done) => self.complete(done),
        }
    }

    fn start(&mut self, start: FileStart) {
        let entry = self.pending.entry(start.file_id).or_default();
        entry.expected_chunks = Some(start.total_chunks);
    }

    fn chunk(&mut self, chunk: FileChunk) {
        // Chunks may arrive without a preceding fileStart.
        let entry = self.pending.entry(chunk.file_id).or_default();
        entry.expected_chunks.get_or_insert(chunk.total);
        entry.buffered_bytes += chunk.chunk.len() as u64;
        entry.chunks.push(Chunk {
            index: chunk.index,
            payload: chunk.chunk,
        });
    }

    fn complete(&mut self, done: FileComplete) -> TransferOutcome {
        let pending = self.pending.remove(&done.file_id).unwrap_or_default();
        let expected = pending.expected_chunks.unwrap_or(0);

        match reassemble(pending.chunks, expected, done.file_size) {
            Ok(bytes) => TransferOutcome::Completed(CompletedTransfer {
                file_id: done.file_id,
                file_name: done.file_name,
                file_type: done.file_type,
                bytes,
            }),
            Err(error) => TransferOutcome::Failed {
                file_id: done.file_id,
                error,
            },
        }
    }

    /// Drop one transfer's buffered chunks.
    ///
    /// Returns `true` if the transfer was pending.
    pub fn discard(&mut self, file_id: &FileId) -> bool {
        self.pending.remove(file_id).is_some()
    }

    /// Drop every pending transfer.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Check if a transfer is in flight.
    pub fn is_pending(&self, file_id: &FileId) -> bool {
        self.pending.contains_key(file_id)
    }

    /// Number of transfers in flight.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if no transfers are in flight.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Bytes currently buffered across all transfers.
    pub fn buffered_bytes(&self) -> u64 {
        self.pending.values().map(|p| p.buffered_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::split;

    fn frames(file_id: &str, data: &[u8], chunk_size: usize) -> Vec<PeerMessage> {
        let chunks = split(data, chunk_size).unwrap();
        let total = chunks.len() as u32;
        let id = FileId::from(file_id);

        let mut out = vec![PeerMessage::FileStart(FileStart {
            file_id: id.clone(),
            file_name: "lesson.pdf".into(),
            file_type: "application/pdf".into(),
            file_size: data.len() as u64,
            total_chunks: total,
        })];
        for chunk in chunks {
            out.push(PeerMessage::File(FileChunk {
                file_id: id.clone(),
                chunk: chunk.payload,
                index: chunk.index,
                total,
                file_name: "lesson.pdf".into(),
                file_type: "application/pdf".into(),
            }));
        }
        out.push(PeerMessage::FileComplete(FileComplete {
            file_id: id,
            file_name: "lesson.pdf".into(),
            file_type: "application/pdf".into(),
            file_size: data.len() as u64,
        }));
        out
    }

    fn feed(buffer: &mut TransferBuffer, messages: Vec<PeerMessage>) -> TransferOutcome {
        let mut last = TransferOutcome::Buffered;
        for msg in messages {
            last = buffer.accept(msg);
        }
        last
    }

    #[test]
    fn completes_a_transfer() {
        let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        let mut buffer = TransferBuffer::new();

        match feed(&mut buffer, frames("f1", &data, 300)) {
            TransferOutcome::Completed(file) => {
                assert_eq!(file.bytes, data);
                assert_eq!(file.file_name, "lesson.pdf");
                assert_eq!(file.file_id, FileId::from("f1"));
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn interleaved_transfers_are_demultiplexed() {
        let a = vec![1u8; 50];
        let b = vec![2u8; 70];
        let mut fa = frames("a", &a, 20).into_iter();
        let mut fb = frames("b", &b, 20).into_iter();

        let mut buffer = TransferBuffer::new();
        let mut done = Vec::new();
        loop {
            let (x, y) = (fa.next(), fb.next());
            if x.is_none() && y.is_none() {
                break;
            }
            for msg in [x, y].into_iter().flatten() {
                if let TransferOutcome::Completed(file) = buffer.accept(msg) {
                    done.push(file);
                }
            }
        }

        assert_eq!(done.len(), 2);
        assert_eq!(done[0].bytes, a);
        assert_eq!(done[1].bytes, b);
    }

    #[test]
    fn missing_chunk_fails_and_discards() {
        let data = vec![9u8; 100];
        let mut messages = frames("f1", &data, 40);
        messages.remove(2); // second chunk

        let mut buffer = TransferBuffer::new();
        match feed(&mut buffer, messages) {
            TransferOutcome::Failed { file_id, error } => {
                assert_eq!(file_id, FileId::from("f1"));
                assert_eq!(
                    error,
                    CodecError::IncompleteTransfer {
                        expected: 3,
                        received: 2
                    }
                );
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!buffer.is_pending(&FileId::from("f1")));
        assert_eq!(buffer.buffered_bytes(), 0);
    }

    #[test]
    fn declared_size_mismatch_fails() {
        let data = vec![3u8; 64];
        let mut messages = frames("f1", &data, 16);
        if let Some(PeerMessage::FileComplete(done)) = messages.last_mut() {
            done.file_size = 65;
        }

        let mut buffer = TransferBuffer::new();
        let outcome = feed(&mut buffer, messages);
        assert!(matches!(
            outcome,
            TransferOutcome::Failed {
                error: CodecError::SizeMismatch { .. },
                ..
            }
        ));
        assert!(buffer.is_empty());
    }

    #[test]
    fn chunks_without_file_start_use_chunk_total() {
        let data = vec![5u8; 30];
        let mut messages = frames("f1", &data, 10);
        messages.remove(0);

        let mut buffer = TransferBuffer::new();
        assert!(matches!(
            feed(&mut buffer, messages),
            TransferOutcome::Completed(_)
        ));
    }

    #[test]
    fn empty_file_transfers() {
        let mut buffer = TransferBuffer::new();
        match feed(&mut buffer, frames("empty", &[], 16)) {
            TransferOutcome::Completed(file) => assert!(file.bytes.is_empty()),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn complete_for_unknown_transfer_with_size_fails() {
        let mut buffer = TransferBuffer::new();
        let outcome = buffer.accept(PeerMessage::FileComplete(FileComplete {
            file_id: FileId::from("ghost"),
            file_name: "x".into(),
            file_type: "y".into(),
            file_size: 10,
        }));
        assert!(matches!(outcome, TransferOutcome::Failed { .. }));
    }

    #[test]
    fn discard_and_clear() {
        let data = vec![1u8; 40];
        let mut messages = frames("f1", &data, 10);
        messages.pop();

        let mut buffer = TransferBuffer::new();
        feed(&mut buffer, messages.clone());
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.buffered_bytes(), 40);

        assert!(buffer.discard(&FileId::from("f1")));
        assert!(!buffer.discard(&FileId::from("f1")));

        feed(&mut buffer, messages);
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn completed_transfer_debug_redacts_bytes() {
        let file = CompletedTransfer {
            file_id: FileId::from("f"),
            file_name: "n".into(),
            file_type: "t".into(),
            bytes: vec![1, 2, 3],
        };
        assert!(format!("{:?}", file).contains("[3 bytes REDACTED]"));
    }
}
