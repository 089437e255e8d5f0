//! Core domain logic for the presence tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Flattening: turning noisy connect/disconnect heartbeats into a canonical stream
//! - Reduction: measuring time during which two distinct users were present
//! - The JSON request/response boundary around both

pub mod event;
pub mod event_type;
mod flatten;
mod partition;
mod reduce;
pub mod request;
pub mod types;

pub use event::{Event, EventKind, Presence};
pub use event_type::{EventType, UnknownEventType};
pub use flatten::{flatten_device_stream, flatten_event_stream, sort_by_time};
pub use partition::{DeviceStreams, partition_events};
pub use reduce::{SessionState, TrackingResult, reduce_events};
pub use request::{RequestError, Response, TrackRequest, handle, handle_flatten, parse_request};
pub use types::{DeviceId, Span, Timestamp, Ttl, UserId, ValidationError};
