//! Session and presence events.

use serde::{Deserialize, Serialize};

use crate::event_type::EventType;
use crate::types::{DeviceId, Timestamp, UserId, ValidationError};

/// A single observation from the event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
pub struct Event {
    /// When the event occurred.
    pub at: Timestamp,
    /// What happened.
    pub kind: EventKind,
}

/// What an event reports.
///
/// Only connect and disconnect carry a [`Presence`]; the session-control
/// kinds are bare.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Start,
    End,
    Pause,
    Unpause,
    Connect(Presence),
    Disconnect(Presence),
}

/// Who is (dis)connecting and from which device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Presence {
    pub user: UserId,
    pub device: DeviceId,
}

impl Presence {
    pub const fn new(user: UserId, device: DeviceId) -> Self {
        Self { user, device }
    }
}

impl Event {
    pub const fn new(at: Timestamp, kind: EventKind) -> Self {
        Self { at, kind }
    }

    pub const fn start(at: Timestamp) -> Self {
        Self::new(at, EventKind::Start)
    }

    pub const fn end(at: Timestamp) -> Self {
        Self::new(at, EventKind::End)
    }

    pub const fn pause(at: Timestamp) -> Self {
        Self::new(at, EventKind::Pause)
    }

    pub const fn unpause(at: Timestamp) -> Self {
        Self::new(at, EventKind::Unpause)
    }

    /// A connect heartbeat for `presence` at `at`.
    pub const fn connect(at: Timestamp, presence: Presence) -> Self {
        Self::new(at, EventKind::Connect(presence))
    }

    /// A disconnect for `presence` at `at`.
    pub const fn disconnect(at: Timestamp, presence: Presence) -> Self {
        Self::new(at, EventKind::Disconnect(presence))
    }

    pub const fn event_type(&self) -> EventType {
        match self.kind {
            EventKind::Start => EventType::Start,
            EventKind::End => EventType::End,
            EventKind::Pause => EventType::Pause,
            EventKind::Unpause => EventType::Unpause,
            EventKind::Connect(_) => EventType::Connect,
            EventKind::Disconnect(_) => EventType::Disconnect,
        }
    }

    /// The user/device pair for connect and disconnect events.
    pub const fn presence(&self) -> Option<&Presence> {
        match &self.kind {
            EventKind::Connect(presence) | EventKind::Disconnect(presence) => Some(presence),
            _ => None,
        }
    }

    pub const fn is_connect(&self) -> bool {
        matches!(self.kind, EventKind::Connect(_))
    }
}

/// Flat wire representation: `{"t": code, "c": timestamp, "u": user, "d": device}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireEvent {
    t: EventType,
    c: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    u: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<DeviceId>,
}

impl WireEvent {
    fn into_presence(self) -> Result<Presence, ValidationError> {
        let kind = self.t.code();
        let user = self.u.ok_or(ValidationError::MissingPresenceField { kind, field: "u" })?;
        let device = self.d.ok_or(ValidationError::MissingPresenceField { kind, field: "d" })?;
        Ok(Presence::new(user, device))
    }
}

impl TryFrom<WireEvent> for Event {
    type Error = ValidationError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let at = wire.c;
        let t = wire.t;
        let kind = match t {
            EventType::Start => EventKind::Start,
            EventType::End => EventKind::End,
            EventType::Pause => EventKind::Pause,
            EventType::Unpause => EventKind::Unpause,
            EventType::Connect => EventKind::Connect(wire.into_presence()?),
            EventType::Disconnect => EventKind::Disconnect(wire.into_presence()?),
        };
        Ok(Self::new(at, kind))
    }
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        let t = event.event_type();
        let (u, d) = match event.kind {
            EventKind::Connect(p) | EventKind::Disconnect(p) => (Some(p.user), Some(p.device)),
            _ => (None, None),
        };
        Self {
            t,
            c: event.at,
            u,
            d,
        }
    }
}
