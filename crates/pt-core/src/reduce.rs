//! Reduction of the canonical stream into tracked time.
//!
//! Time is tracked only while at least two distinct users hold an open
//! device connection and the session is not paused. Pause dominates
//! connectivity: pausing closes any open interval, and unpausing only
//! reopens one if two users are already present.

use std::collections::HashMap;

use serde::Serialize;

use crate::event::{Event, EventKind};
use crate::types::{DeviceId, Span, Timestamp, UserId};

/// Session state at the end of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Fewer than two users present.
    Idle,
    /// Two or more users present and not paused.
    InProgress,
    /// Paused, regardless of who is present.
    Paused,
}

impl SessionState {
    /// Integer code used on the wire.
    pub const fn code(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::InProgress => 1,
            Self::Paused => 2,
        }
    }
}

impl Serialize for SessionState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

/// Aggregate measurement over a canonical stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingResult {
    /// Total time with two users present and the session running.
    pub tracked_time: Span,
    /// Start of the most recent tracked interval.
    pub last_active: Option<Timestamp>,
    /// Timestamp of the last event processed.
    pub state_time: Option<Timestamp>,
    pub state: SessionState,
}

/// Running state of the reduction.
#[derive(Debug, Default)]
struct Tally {
    connected: HashMap<DeviceId, UserId>,
    /// Start of the open interval, if any.
    interval_start: Option<Timestamp>,
    last_active: Option<Timestamp>,
    paused: bool,
    tracked: Span,
    state_time: Option<Timestamp>,
}

impl Tally {
    /// True when the connected devices belong to at least two distinct users.
    fn both_connected(&self) -> bool {
        let mut users = self.connected.values();
        let Some(first) = users.next() else {
            return false;
        };
        users.any(|user| user != first)
    }

    fn open(&mut self, at: Timestamp) {
        self.interval_start = Some(at);
        self.last_active = Some(at);
    }

    fn close(&mut self, at: Timestamp) {
        if let Some(start) = self.interval_start.take() {
            self.tracked += at - start;
        }
    }

    fn finish(self) -> TrackingResult {
        let state = if self.paused {
            SessionState::Paused
        } else if self.both_connected() {
            SessionState::InProgress
        } else {
            SessionState::Idle
        };

        TrackingResult {
            tracked_time: self.tracked,
            last_active: self.last_active,
            state_time: self.state_time,
            state,
        }
    }
}

/// Computes tracked time, last activity and final state.
///
/// Events are processed in the given order, which should be the canonical
/// stream produced by [`crate::flatten_event_stream`]. Processing stops
/// after the first end event.
pub fn reduce_events(events: &[Event]) -> TrackingResult {
    let mut tally = Tally::default();

    for event in events {
        let at = event.at;
        match &event.kind {
            EventKind::Connect(presence) => {
                let was_both = tally.both_connected();
                tally
                    .connected
                    .insert(presence.device.clone(), presence.user.clone());
                if !was_both && tally.both_connected() && !tally.paused {
                    tally.open(at);
                }
            }
            EventKind::Disconnect(presence) => {
                let was_both = tally.both_connected();
                tally.connected.remove(&presence.device);
                if was_both && !tally.both_connected() && !tally.paused {
                    tally.close(at);
                }
            }
            EventKind::Pause => {
                if !tally.paused {
                    tally.close(at);
                }
                tally.paused = true;
            }
            EventKind::Unpause => {
                if tally.both_connected() {
                    tally.open(at);
                }
                tally.paused = false;
            }
            EventKind::Start => {}
            EventKind::End => {
                if !tally.paused {
                    tally.close(at);
                }
                tally.state_time = Some(at);
                break;
            }
        }

        tally.state_time = Some(at);
    }

    tally.finish()
}
