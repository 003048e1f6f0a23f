use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Canonical room identifier.
///
/// Clients historically sent room ids as either a JSON number or a string,
/// and a string key never matches a numeric subscription. Deserialization
/// accepts both forms and normalizes to one numeric id at every ingress
/// point; serialization always emits a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

impl From<i64> for RoomId {
    fn from(id: i64) -> Self {
        RoomId(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RoomIdVisitor;

        impl Visitor<'_> for RoomIdVisitor {
            type Value = RoomId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a room id as an integer or a numeric string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<RoomId, E> {
                Ok(RoomId(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<RoomId, E> {
                i64::try_from(v)
                    .map(RoomId)
                    .map_err(|_| E::custom(format!("room id {} out of range", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RoomId, E> {
                v.parse::<i64>()
                    .map(RoomId)
                    .map_err(|_| E::custom(format!("invalid room id '{}'", v)))
            }
        }

        deserializer.deserialize_any(RoomIdVisitor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub room_id: RoomId,
    pub author: String,
    pub text: Option<String>,
    /// Opaque reference into the upload store (a stored filename).
    pub image: Option<String>,
    /// Milliseconds since the Unix epoch; best-effort monotonic within a
    /// room, ties broken by ascending id.
    pub ts: i64,
    /// Users who have acknowledged this message. Each user appears once.
    pub read_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub last_seen: i64,
}

/// One pending instruction for a polling device. Immutable once enqueued;
/// removed only by a drain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
    pub ts: i64,
}
