//! Splitting a time-sorted event list into per-device streams.

use std::collections::HashMap;

use crate::event::{Event, EventKind};
use crate::types::DeviceId;

/// Result of partitioning: one connect/disconnect stream per device plus the
/// session-control events.
#[derive(Debug, Clone, Default)]
pub struct DeviceStreams {
    /// Device buckets in order of first appearance.
    streams: Vec<(DeviceId, Vec<Event>)>,
    index: HashMap<DeviceId, usize>,
    other: Vec<Event>,
}

impl DeviceStreams {
    fn push_device_event(&mut self, device: DeviceId, event: Event) {
        if let Some(&slot) = self.index.get(&device) {
            self.streams[slot].1.push(event);
        } else {
            self.index.insert(device.clone(), self.streams.len());
            self.streams.push((device, vec![event]));
        }
    }

    /// Device buckets in order of first appearance.
    pub fn devices(&self) -> impl Iterator<Item = (&DeviceId, &[Event])> {
        self.streams
            .iter()
            .map(|(device, events)| (device, events.as_slice()))
    }

    /// Number of distinct devices seen.
    pub fn device_count(&self) -> usize {
        self.streams.len()
    }

    /// Start, end, pause and unpause events that survived duplicate suppression.
    pub fn other(&self) -> &[Event] {
        &self.other
    }
}

/// Partitions `events` (assumed time-sorted) in a single pass.
///
/// Pause and unpause only toggle a session-wide flag: a pause while already
/// paused, or an unpause while running, is dropped. Scanning stops right
/// after the first end event; anything later is discarded.
pub fn partition_events(events: impl IntoIterator<Item = Event>) -> DeviceStreams {
    let mut result = DeviceStreams::default();
    let mut paused = false;

    for event in events {
        match &event.kind {
            EventKind::Connect(presence) | EventKind::Disconnect(presence) => {
                let device = presence.device.clone();
                result.push_device_event(device, event);
            }
            EventKind::Pause => {
                if !paused {
                    result.other.push(event);
                }
                paused = true;
            }
            EventKind::Unpause => {
                if paused {
                    result.other.push(event);
                }
                paused = false;
            }
            EventKind::Start => result.other.push(event),
            EventKind::End => {
                result.other.push(event);
                break;
            }
        }
    }

    result
}
