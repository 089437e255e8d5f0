//! Event type enum as the single source of truth for wire codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The six kinds of session and presence events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Start,
    End,
    Pause,
    Unpause,
    Connect,
    Disconnect,
}

impl EventType {
    /// One-character code used in the `t` field of wire events.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Start => "s",
            Self::End => "e",
            Self::Pause => "p",
            Self::Unpause => "u",
            Self::Connect => "c",
            Self::Disconnect => "d",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(Self::Start),
            "e" => Ok(Self::End),
            "p" => Ok(Self::Pause),
            "u" => Ok(Self::Unpause),
            "c" => Ok(Self::Connect),
            "d" => Ok(Self::Disconnect),
            _ => Err(UnknownEventType(s.to_string())),
        }
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown event type codes.
#[derive(Debug, Clone)]
pub struct UnknownEventType(String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type: {}", self.0)
    }
}

impl std::error::Error for UnknownEventType {}
