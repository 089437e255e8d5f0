//! Stream normalization.
//!
//! Turns a raw, unordered and noisy event list into the canonical stream:
//!
//! 1. Stable-sort by timestamp and partition into per-device streams
//! 2. Flatten each device stream independently (collapse repeated
//!    heartbeats, infer disconnects for connections that outlived the TTL)
//! 3. Merge everything back and stable-sort again

use rayon::prelude::*;

use crate::event::{Event, Presence};
use crate::partition::partition_events;
use crate::types::{Timestamp, Ttl};

/// Stable sort by timestamp; events sharing a timestamp keep their order.
pub fn sort_by_time(events: &mut [Event]) {
    events.sort_by(|a, b| a.at.total_cmp(&b.at));
}

/// Inferred disconnect placed halfway into the TTL after the last heartbeat.
fn timeout_disconnect(heartbeat: Timestamp, ttl: Ttl, presence: &Presence) -> Event {
    let at = heartbeat + ttl.half();
    tracing::trace!(device = %presence.device, %at, "inferring timeout disconnect");
    Event::disconnect(at, presence.clone())
}

/// Cleans one device's connect/disconnect stream.
///
/// Events must belong to a single device and be sorted by timestamp.
/// A connect arriving less than `ttl` after the previous heartbeat is a
/// duplicate and is dropped, though it still refreshes the heartbeat. A gap of
/// `ttl` or more means the connection died in between, so a disconnect is
/// inferred at `heartbeat + ttl / 2`. Consecutive disconnects collapse to one.
///
/// With `current_time`, a stream that still ends connected gets a trailing
/// inferred disconnect if its last heartbeat is at least `ttl` old.
pub fn flatten_device_stream(
    events: &[Event],
    ttl: Ttl,
    current_time: Option<Timestamp>,
) -> Vec<Event> {
    let Some((first, rest)) = events.split_first() else {
        return Vec::new();
    };

    let mut result = vec![first.clone()];
    // Latest heartbeat while the output ends in a connect; None once it ends in a disconnect.
    let mut heartbeat = first.is_connect().then_some(first.at);

    for event in rest {
        let Some(presence) = event.presence() else {
            continue;
        };

        if event.is_connect() {
            match heartbeat {
                Some(last) if event.at - last < ttl.span() => {}
                Some(last) => {
                    result.push(timeout_disconnect(last, ttl, presence));
                    result.push(event.clone());
                }
                None => result.push(event.clone()),
            }
            heartbeat = Some(event.at);
        } else if let Some(last) = heartbeat.take() {
            if event.at - last >= ttl.span() {
                // Already timed out; the real disconnect arrives too late to count.
                result.push(timeout_disconnect(last, ttl, presence));
            } else {
                result.push(event.clone());
            }
        }
    }

    if let (Some(last), Some(now)) = (heartbeat, current_time) {
        if now - last >= ttl.span() {
            if let Some(presence) = result.last().and_then(Event::presence) {
                let trailing = timeout_disconnect(last, ttl, presence);
                result.push(trailing);
            }
        }
    }

    result
}

/// Produces the canonical stream consumed by [`crate::reduce_events`].
pub fn flatten_event_stream(
    events: &[Event],
    ttl: Ttl,
    current_time: Option<Timestamp>,
) -> Vec<Event> {
    let mut sorted = events.to_vec();
    sort_by_time(&mut sorted);

    let streams = partition_events(sorted);
    let buckets: Vec<&[Event]> = streams.devices().map(|(_, bucket)| bucket).collect();

    let flattened: Vec<Vec<Event>> = buckets
        .par_iter()
        .map(|device_events| flatten_device_stream(device_events, ttl, current_time))
        .collect();
    let mut result = streams.other().to_vec();
    result.extend(flattened.into_iter().flatten());
    sort_by_time(&mut result);

    tracing::debug!(
        input = events.len(),
        output = result.len(),
        devices = streams.device_count(),
        "flattened event stream"
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixtures::*;
    use crate::partition::partition_events;

    use proptest::prelude::*;

    fn ttl(value: f64) -> Ttl {
        Ttl::new(value).unwrap()
    }

    #[test]
    fn empty_device_stream() {
        assert!(flatten_device_stream(&[], ttl(4.0), Some(ts(4.0))).is_empty());
    }

    #[test]
    fn collapses_connects_within_ttl() {
        let events = [
            connect(0.0, 1, "1"),
            connect(1.0, 1, "1"),
            connect(2.0, 1, "1"),
            connect(3.0, 1, "1"),
        ];
        assert_eq!(
            flatten_device_stream(&events, ttl(4.0), Some(ts(4.0))),
            [connect(0.0, 1, "1")]
        );
    }

    #[test]
    fn keeps_disconnect_after_collapsed_connects() {
        let events = [
            connect(0.0, 1, "1"),
            connect(1.0, 1, "1"),
            connect(2.0, 1, "1"),
            disconnect(3.0, 1, "1"),
        ];
        assert_eq!(
            flatten_device_stream(&events, ttl(4.0), Some(ts(4.0))),
            [connect(0.0, 1, "1"), disconnect(3.0, 1, "1")]
        );
    }

    #[test]
    fn adds_trailing_disconnect_for_stale_heartbeat() {
        let events = [
            connect(0.0, 1, "1"),
            connect(1.0, 1, "1"),
            connect(2.0, 1, "1"),
            connect(3.0, 1, "1"),
        ];
        // Dropped duplicates still refresh the heartbeat: 3 + 4 / 2 = 5.
        assert_eq!(
            flatten_device_stream(&events, ttl(4.0), Some(ts(10.0))),
            [connect(0.0, 1, "1"), disconnect(5.0, 1, "1")]
        );
    }

    #[test]
    fn no_trailing_disconnect_before_ttl_elapses() {
        let events = [connect(3.0, 1, "1")];
        assert_eq!(
            flatten_device_stream(&events, ttl(4.0), Some(ts(5.0))),
            [connect(3.0, 1, "1")]
        );
    }

    #[test]
    fn trailing_disconnect_at_exact_ttl() {
        let events = [connect(0.0, 1, "1")];
        assert_eq!(
            flatten_device_stream(&events, ttl(4.0), Some(ts(4.0))),
            [connect(0.0, 1, "1"), disconnect(2.0, 1, "1")]
        );
    }

    #[test]
    fn no_trailing_disconnect_without_current_time() {
        let events = [connect(0.0, 1, "1")];
        assert_eq!(
            flatten_device_stream(&events, ttl(4.0), None),
            [connect(0.0, 1, "1")]
        );
    }

    #[test]
    fn injects_disconnect_on_heartbeat_gap() {
        let events = [connect(0.0, 1, "1"), connect(5.0, 1, "1")];
        assert_eq!(
            flatten_device_stream(&events, ttl(4.0), Some(ts(6.0))),
            [
                connect(0.0, 1, "1"),
                disconnect(2.0, 1, "1"),
                connect(5.0, 1, "1"),
            ]
        );
    }

    #[test]
    fn collapses_repeated_disconnects() {
        let events = [
            disconnect(0.0, 1, "1"),
            disconnect(0.0, 1, "1"),
            disconnect(0.0, 1, "1"),
        ];
        assert_eq!(
            flatten_device_stream(&events, ttl(4.0), Some(ts(10.0))),
            [disconnect(0.0, 1, "1")]
        );
    }

    #[test]
    fn late_disconnect_is_replaced_by_inferred_one() {
        let events = [connect(0.0, 1, "1"), disconnect(6.0, 1, "1")];
        assert_eq!(
            flatten_device_stream(&events, ttl(4.0), Some(ts(10.0))),
            [connect(0.0, 1, "1"), disconnect(2.0, 1, "1")]
        );
    }

    #[test]
    fn inferred_disconnect_uses_incoming_user() {
        let events = [connect(0.0, 1, "1"), connect(8.0, 2, "1")];
        assert_eq!(
            flatten_device_stream(&events, ttl(4.0), None),
            [
                connect(0.0, 1, "1"),
                disconnect(2.0, 2, "1"),
                connect(8.0, 2, "1"),
            ]
        );
    }

    #[test]
    fn fractional_midpoint() {
        let events = [connect(0.0, 1, "1")];
        assert_eq!(
            flatten_device_stream(&events, ttl(3.0), Some(ts(3.0))),
            [connect(0.0, 1, "1"), disconnect(1.5, 1, "1")]
        );
    }

    #[test]
    fn sorts_input_and_stops_at_end() {
        let events = [
            start(1.0),
            connect(2.0, 1, "1"),
            disconnect(4.0, 1, "1"),
            end(3.0),
        ];
        assert_eq!(
            flatten_event_stream(&events, ttl(4.0), Some(ts(4.0))),
            [start(1.0), connect(2.0, 1, "1"), end(3.0)]
        );
    }

    #[test]
    fn flattens_session_stream() {
        let events = [
            start(0.0),
            pause(1.0),
            connect(2.0, 1, "1"),
            connect(3.0, 2, "2"),
            connect(6.0, 1, "1"),
            unpause(7.0),
        ];
        assert_eq!(
            flatten_event_stream(&events, ttl(4.0), Some(ts(10.0))),
            [
                start(0.0),
                pause(1.0),
                connect(2.0, 1, "1"),
                connect(3.0, 2, "2"),
                disconnect(4.0, 1, "1"),
                disconnect(5.0, 2, "2"),
                connect(6.0, 1, "1"),
                unpause(7.0),
                disconnect(8.0, 1, "1"),
            ]
        );
    }

    #[test]
    fn skips_duplicate_pause_events() {
        let events = [pause(1.0), pause(2.0), unpause(3.0), unpause(4.0)];
        assert_eq!(
            flatten_event_stream(&events, ttl(4.0), Some(ts(10.0))),
            [pause(1.0), unpause(3.0)]
        );
    }

    #[test]
    fn stops_on_end_event() {
        let events = [start(1.0), pause(2.0), end(3.0), unpause(4.0)];
        assert_eq!(
            flatten_event_stream(&events, ttl(4.0), Some(ts(10.0))),
            [start(1.0), pause(2.0), end(3.0)]
        );
    }

    #[test]
    fn ties_keep_input_order() {
        let events = [
            connect(1.0, 2, "b"),
            start(1.0),
            connect(1.0, 1, "a"),
            pause(1.0),
        ];
        // Control events first, then device buckets in first-appearance order.
        assert_eq!(
            flatten_event_stream(&events, ttl(4.0), None),
            [
                start(1.0),
                pause(1.0),
                connect(1.0, 2, "b"),
                connect(1.0, 1, "a"),
            ]
        );
    }

    #[test]
    fn reflattening_canonical_stream_is_stable() {
        let events = [
            start(0.0),
            pause(1.0),
            connect(2.0, 1, "1"),
            connect(3.0, 2, "2"),
            connect(6.0, 1, "1"),
            unpause(7.0),
        ];
        let once = flatten_event_stream(&events, ttl(4.0), Some(ts(10.0)));
        let twice = flatten_event_stream(&once, ttl(4.0), Some(ts(10.0)));
        assert_eq!(once, twice);
    }

    proptest! {
        #[test]
        fn canonical_stream_is_sorted(
            events in arb_events(),
            ttl_value in 1u8..10,
            now in proptest::option::of(0u8..80),
        ) {
            let ttl = ttl(f64::from(ttl_value));
            let now = now.map(|n| ts(f64::from(n)));
            let flat = flatten_event_stream(&events, ttl, now);
            prop_assert!(flat.windows(2).all(|pair| pair[0].at <= pair[1].at));
        }

        #[test]
        fn control_events_pass_through_in_order(
            events in arb_events(),
            ttl_value in 1u8..10,
        ) {
            let ttl = ttl(f64::from(ttl_value));
            let flat = flatten_event_stream(&events, ttl, None);

            let mut sorted = events.clone();
            sort_by_time(&mut sorted);
            let expected = partition_events(sorted).other().to_vec();

            let control: Vec<Event> = flat.into_iter().filter(|e| e.presence().is_none()).collect();
            prop_assert_eq!(control, expected);
        }

        #[test]
        fn flattened_device_stream_alternates(
            events in arb_events(),
            ttl_value in 1u8..10,
            now in proptest::option::of(0u8..80),
        ) {
            let ttl = ttl(f64::from(ttl_value));
            let now = now.map(|n| ts(f64::from(n)));
            let mut sorted = events.clone();
            sort_by_time(&mut sorted);
            let streams = partition_events(sorted);
            for (_, device_events) in streams.devices() {
                let flat = flatten_device_stream(device_events, ttl, now);
                prop_assert!(
                    flat.windows(2).all(|pair| pair[0].is_connect() != pair[1].is_connect()),
                    "device stream must alternate connect/disconnect: {:?}", flat
                );
            }
        }
    }
}
