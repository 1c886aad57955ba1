//! Session descriptions exchanged out of band during peer negotiation.
//!
//! The host's offer and the joiner's answer travel through whatever side
//! channel the users have (a QR code, a chat message, a shared file). Each
//! description is encoded as a base64 JSON blob so it survives copy and
//! paste:
//!
//! `BASE64URL(JSON({ version, kind, roomId, sessionId, sdp }))`

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use mesh_types::{ErrorKind, RoomId};

/// Current description format version.
pub const DESCRIPTION_VERSION: u32 = 1;

/// Error type for signaling payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The blob is not valid base64 JSON, or a field is blank.
    InvalidPayload(String),
    /// The blob was produced by an incompatible version.
    UnsupportedVersion(u32),
    /// An offer was expected and an answer supplied, or vice versa.
    UnexpectedKind {
        /// What the caller needed.
        expected: DescriptionKind,
        /// What the blob contained.
        found: DescriptionKind,
    },
    /// The offer was created for a different room.
    RoomMismatch {
        /// Room the caller asked to join.
        expected: RoomId,
        /// Room named in the offer.
        found: RoomId,
    },
    /// The answer belongs to a different negotiation.
    SessionMismatch {
        /// Session id of our offer.
        expected: String,
        /// Session id the answer echoes.
        found: String,
    },
}

impl SignalError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

impl std::fmt::Display for SignalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalError::InvalidPayload(msg) => write!(f, "invalid session description: {}", msg),
            SignalError::UnsupportedVersion(v) => {
                write!(f, "unsupported session description version: {}", v)
            }
            SignalError::UnexpectedKind { expected, found } => {
                write!(f, "expected {} description, got {}", expected, found)
            }
            SignalError::RoomMismatch { expected, found } => {
                write!(f, "offer is for room {}, not {}", found, expected)
            }
            SignalError::SessionMismatch { expected, found } => {
                write!(f, "answer is for session {}, not {}", found, expected)
            }
        }
    }
}

impl std::error::Error for SignalError {}

/// Which half of the handshake a description carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DescriptionKind {
    /// Produced by the host.
    Offer,
    /// Produced by the joiner in response to an offer.
    Answer,
}

impl std::fmt::Display for DescriptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptionKind::Offer => f.write_str("offer"),
            DescriptionKind::Answer => f.write_str("answer"),
        }
    }
}

/// One side's connection description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescription {
    /// Format version.
    pub version: u32,
    /// Offer or answer.
    pub kind: DescriptionKind,
    /// Room this negotiation belongs to.
    pub room_id: RoomId,
    /// Identifies one negotiation; the answer echoes the offer's value.
    pub session_id: String,
    /// Opaque transport description produced by the connector.
    pub sdp: String,
}

impl SessionDescription {
    /// Create an offer for `room_id`.
    pub fn offer(room_id: RoomId, session_id: impl Into<String>, sdp: impl Into<String>) -> Self {
        Self {
            version: DESCRIPTION_VERSION,
            kind: DescriptionKind::Offer,
            room_id,
            session_id: session_id.into(),
            sdp: sdp.into(),
        }
    }

    /// Create the answer to `offer`.
    pub fn answer_to(offer: &SessionDescription, sdp: impl Into<String>) -> Self {
        Self {
            version: DESCRIPTION_VERSION,
            kind: DescriptionKind::Answer,
            room_id: offer.room_id.clone(),
            session_id: offer.session_id.clone(),
            sdp: sdp.into(),
        }
    }

    /// Encode as a base64 JSON blob.
    pub fn to_blob(&self) -> Result<String, SignalError> {
        let json = serde_json::to_string(self)
            .map_err(|e| SignalError::InvalidPayload(format!("json encode: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(json.as_bytes()))
    }

    /// Decode a base64 JSON blob.
    pub fn from_blob(blob: &str) -> Result<Self, SignalError> {
        let json_bytes = URL_SAFE_NO_PAD
            .decode(blob.trim())
            .map_err(|e| SignalError::InvalidPayload(format!("base64 decode: {}", e)))?;

        let desc: Self = serde_json::from_slice(&json_bytes)
            .map_err(|e| SignalError::InvalidPayload(format!("json parse: {}", e)))?;

        if desc.version != DESCRIPTION_VERSION {
            return Err(SignalError::UnsupportedVersion(desc.version));
        }
        if desc.room_id.as_str().trim().is_empty() {
            return Err(SignalError::InvalidPayload("blank room id".into()));
        }
        if desc.session_id.is_empty() {
            return Err(SignalError::InvalidPayload("blank session id".into()));
        }

        Ok(desc)
    }

    /// Accept this description only if it is an offer for `room_id`.
    pub fn expect_offer_for(&self, room_id: &RoomId) -> Result<(), SignalError> {
        self.expect_kind(DescriptionKind::Offer)?;
        if &self.room_id != room_id {
            return Err(SignalError::RoomMismatch {
                expected: room_id.clone(),
                found: self.room_id.clone(),
            });
        }
        Ok(())
    }

    /// Accept this description only if it answers the offer with
    /// `session_id`.
    pub fn expect_answer_for(&self, session_id: &str) -> Result<(), SignalError> {
        self.expect_answer()?;
        if self.session_id != session_id {
            return Err(SignalError::SessionMismatch {
                expected: session_id.to_string(),
                found: self.session_id.clone(),
            });
        }
        Ok(())
    }

    /// Accept this description only if it is an answer.
    pub fn expect_answer(&self) -> Result<(), SignalError> {
        self.expect_kind(DescriptionKind::Answer)
    }

    fn expect_kind(&self, expected: DescriptionKind) -> Result<(), SignalError> {
        if self.kind != expected {
            return Err(SignalError::UnexpectedKind {
                expected,
                found: self.kind,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(name: &str) -> RoomId {
        RoomId::new(name).unwrap()
    }

    #[test]
    fn blob_roundtrip() {
        let offer = SessionDescription::offer(room("class-7b"), "s1", "host-sdp");
        let blob = offer.to_blob().unwrap();
        let decoded = SessionDescription::from_blob(&blob).unwrap();
        assert_eq!(decoded, offer);
    }

    #[test]
    fn blob_is_url_safe() {
        let offer = SessionDescription::offer(room("r"), "s", "?>?>?>~~~");
        let blob = offer.to_blob().unwrap();
        assert!(!blob.contains('+'));
        assert!(!blob.contains('/'));
        assert!(!blob.contains('='));
    }

    #[test]
    fn wire_fields_are_camel_case() {
        let offer = SessionDescription::offer(room("r"), "s", "x");
        let json = serde_json::to_value(&offer).unwrap();
        assert_eq!(json["kind"], "offer");
        assert_eq!(json["roomId"], "r");
        assert_eq!(json["sessionId"], "s");
    }

    #[test]
    fn answer_echoes_offer() {
        let offer = SessionDescription::offer(room("r"), "s1", "a");
        let answer = SessionDescription::answer_to(&offer, "b");
        assert_eq!(answer.kind, DescriptionKind::Answer);
        assert_eq!(answer.room_id, offer.room_id);
        assert_eq!(answer.session_id, "s1");
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            SessionDescription::from_blob("not base64!!"),
            Err(SignalError::InvalidPayload(_))
        ));
        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(matches!(
            SessionDescription::from_blob(&not_json),
            Err(SignalError::InvalidPayload(_))
        ));
    }

    #[test]
    fn version_is_checked() {
        let mut offer = SessionDescription::offer(room("r"), "s", "x");
        offer.version = 9;
        let blob = offer.to_blob().unwrap();
        assert_eq!(
            SessionDescription::from_blob(&blob),
            Err(SignalError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn offer_for_wrong_room_is_rejected() {
        let offer = SessionDescription::offer(room("a"), "s", "x");
        let err = offer.expect_offer_for(&room("b")).unwrap_err();
        assert!(matches!(err, SignalError::RoomMismatch { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(offer.expect_offer_for(&room("a")).is_ok());
    }

    #[test]
    fn kind_is_checked() {
        let offer = SessionDescription::offer(room("a"), "s", "x");
        assert_eq!(
            offer.expect_answer(),
            Err(SignalError::UnexpectedKind {
                expected: DescriptionKind::Answer,
                found: DescriptionKind::Offer,
            })
        );

        let answer = SessionDescription::answer_to(&offer, "y");
        assert!(answer.expect_answer().is_ok());
        assert!(answer.expect_offer_for(&room("a")).is_err());
    }

    #[test]
    fn answer_must_match_session() {
        let offer = SessionDescription::offer(room("a"), "s1", "x");
        let answer = SessionDescription::answer_to(&offer, "y");
        assert!(answer.expect_answer_for("s1").is_ok());
        assert!(matches!(
            answer.expect_answer_for("s2"),
            Err(SignalError::SessionMismatch { .. })
        ));
    }
}
