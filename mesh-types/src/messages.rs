//! File transfer framing carried over a peer data channel.
//!
//! A data channel delivers discrete messages, not a byte stream, so a
//! transfer is expressed as one `fileStart`, one `file` message per chunk,
//! and one `fileComplete`. Messages are JSON text frames:
//!
//! ```text
//! {"type":"fileStart","fileId":..,"fileName":..,"fileType":..,"fileSize":..,"totalChunks":..}
//! {"type":"file","fileId":..,"chunk":[..],"index":..,"total":..,"fileName":..,"fileType":..}
//! {"type":"fileComplete","fileId":..,"fileName":..,"fileType":..,"fileSize":..}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{FileId, WireError};

/// All messages exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PeerMessage {
    /// Announces a transfer.
    FileStart(FileStart),
    /// One chunk of a transfer.
    File(FileChunk),
    /// Marks the end of a transfer.
    FileComplete(FileComplete),
}

impl PeerMessage {
    /// The transfer this message belongs to.
    pub fn file_id(&self) -> &FileId {
        match self {
            PeerMessage::FileStart(m) => &m.file_id,
            PeerMessage::File(m) => &m.file_id,
            PeerMessage::FileComplete(m) => &m.file_id,
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Encode)
    }

    /// Parse a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, WireError> {
        serde_json::from_str(text).map_err(WireError::Decode)
    }
}

/// Transfer announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStart {
    /// Transfer id; also the id of the resulting file.
    pub file_id: FileId,
    /// File name.
    pub file_name: String,
    /// MIME type.
    pub file_type: String,
    /// Total size in bytes.
    pub file_size: u64,
    /// Number of chunk messages that follow.
    pub total_chunks: u32,
}

/// One chunk of a transfer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChunk {
    /// Transfer id.
    pub file_id: FileId,
    /// Chunk bytes (a JSON array of numbers on the wire).
    pub chunk: Vec<u8>,
    /// Zero-based chunk position.
    pub index: u32,
    /// Total number of chunks in the transfer.
    pub total: u32,
    /// File name, repeated so a receiver can work without `fileStart`.
    pub file_name: String,
    /// MIME type, repeated for the same reason.
    pub file_type: String,
}

impl fmt::Debug for FileChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileChunk")
            .field("file_id", &self.file_id)
            .field("chunk", &format!("[{} bytes REDACTED]", self.chunk.len()))
            .field("index", &self.index)
            .field("total", &self.total)
            .field("file_name", &self.file_name)
            .field("file_type", &self.file_type)
            .finish()
    }
}

/// End-of-transfer marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileComplete {
    /// Transfer id.
    pub file_id: FileId,
    /// File name.
    pub file_name: String,
    /// MIME type.
    pub file_type: String,
    /// Declared total size; reassembly must produce exactly this many bytes.
    pub file_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_start_uses_camel_case_wire_names() {
        let msg = PeerMessage::FileStart(FileStart {
            file_id: FileId::from("f1"),
            file_name: "notes.pdf".into(),
            file_type: "application/pdf".into(),
            file_size: 40_000,
            total_chunks: 3,
        });
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "fileStart");
        assert_eq!(json["fileId"], "f1");
        assert_eq!(json["fileName"], "notes.pdf");
        assert_eq!(json["fileType"], "application/pdf");
        assert_eq!(json["fileSize"], 40_000);
        assert_eq!(json["totalChunks"], 3);
    }

    #[test]
    fn chunk_bytes_are_a_number_array() {
        let msg = PeerMessage::File(FileChunk {
            file_id: FileId::from("f1"),
            chunk: vec![1, 2, 255],
            index: 0,
            total: 1,
            file_name: "a".into(),
            file_type: "b".into(),
        });
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["chunk"], serde_json::json!([1, 2, 255]));
    }

    #[test]
    fn parses_frame_from_another_implementation() {
        let text = r#"{"type":"fileComplete","fileId":"abc","fileName":"x.txt","fileType":"text/plain","fileSize":12}"#;
        let msg = PeerMessage::from_json(text).unwrap();
        match msg {
            PeerMessage::FileComplete(done) => {
                assert_eq!(done.file_id, FileId::from("abc"));
                assert_eq!(done.file_size, 12);
            }
            other => panic!("expected FileComplete, got {:?}", other),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = PeerMessage::from_json(r#"{"type":"chat","text":"hi"}"#);
        assert!(matches!(result, Err(WireError::Decode(_))));
    }

    #[test]
    fn file_id_accessor_covers_all_variants() {
        let done = PeerMessage::FileComplete(FileComplete {
            file_id: FileId::from("z"),
            file_name: String::new(),
            file_type: String::new(),
            file_size: 0,
        });
        assert_eq!(done.file_id().as_str(), "z");
    }
}
