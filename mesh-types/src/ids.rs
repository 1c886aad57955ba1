//! Identity and time types for EduMesh.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix timestamp in milliseconds.
pub type Timestamp = u64;

/// Current wall-clock time as a [`Timestamp`].
///
/// Returns 0 if the system clock is before the Unix epoch.
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random identifier (UUID v4).
            pub fn random() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Check whether the identifier is empty.
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a stored file blob. Also the `fileId` of a peer transfer.
    FileId
);

string_id!(
    /// Identifier of a lesson. Remote lessons keep the id assigned remotely.
    LessonId
);

string_id!(
    /// Identifier of a quiz submission.
    QuizResultId
);

string_id!(
    /// Identifier of an outbound sync queue item.
    QueueItemId
);

string_id!(
    /// The authenticated actor on whose behalf records are pushed.
    ///
    /// Resolved by an external authentication layer and passed explicitly.
    ActorId
);

/// Identifier of a peer-to-peer room (the out-of-band rendezvous name).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Create a room id. Returns `None` for blank input.
    pub fn new(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Get the room id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoomId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_uuid_v4() {
        let id = FileId::random();
        let parsed = uuid::Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn random_ids_are_unique() {
        assert_ne!(QueueItemId::random(), QueueItemId::random());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = LessonId::from("lesson_1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"lesson_1\"");
    }

    #[test]
    fn blank_id_is_empty() {
        assert!(LessonId::from("  ").is_empty());
        assert!(!LessonId::from("L1").is_empty());
    }

    #[test]
    fn room_id_rejects_blank() {
        assert!(RoomId::new("").is_none());
        assert!(RoomId::new("   ").is_none());
        assert_eq!(RoomId::new(" R1 ").unwrap().as_str(), "R1");
    }

    #[test]
    fn debug_names_the_type() {
        let id = ActorId::from("uid-7");
        assert_eq!(format!("{:?}", id), "ActorId(uid-7)");
    }

    #[test]
    fn now_millis_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
