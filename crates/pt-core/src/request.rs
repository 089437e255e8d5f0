//! Request decoding and response encoding for the JSON boundary.
//!
//! A request is `{"events": [...], "ttl": <number>, "currentTime": <number|null>}`.
//! All three keys must be present; `currentTime` may be `null`. Anything that
//! fails validation is answered with `{"error": <message>}` instead of a
//! result, so callers always get a JSON object back.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::event::Event;
use crate::flatten::flatten_event_stream;
use crate::reduce::{TrackingResult, reduce_events};
use crate::types::{Timestamp, Ttl};

/// Top-level keys every request must carry.
pub const REQUIRED_FIELDS: [&str; 3] = ["events", "ttl", "currentTime"];

/// Errors detected before the tracker runs.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The payload was not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// The payload was valid JSON but not an object.
    #[error("request must be a JSON object")]
    NotAnObject,

    /// A required top-level key was absent.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// The keys were present but an event or the TTL was malformed.
    #[error("invalid request: {0}")]
    Invalid(#[source] serde_json::Error),
}

/// A decoded tracking request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub events: Vec<Event>,
    pub ttl: Ttl,
    pub current_time: Option<Timestamp>,
}

impl TrackRequest {
    /// The canonical stream for this request.
    pub fn flatten(&self) -> Vec<Event> {
        flatten_event_stream(&self.events, self.ttl, self.current_time)
    }

    /// Flattens and reduces in one go.
    pub fn track(&self) -> TrackingResult {
        reduce_events(&self.flatten())
    }
}

/// Parses and validates a request payload.
pub fn parse_request(input: &str) -> Result<TrackRequest, RequestError> {
    let value: Value = serde_json::from_str(input).map_err(RequestError::Json)?;
    let Value::Object(fields) = &value else {
        return Err(RequestError::NotAnObject);
    };
    if let Some(missing) = REQUIRED_FIELDS
        .into_iter()
        .find(|field| !fields.contains_key(*field))
    {
        return Err(RequestError::MissingField(missing));
    }
    serde_json::from_value(value).map_err(RequestError::Invalid)
}

/// Either a result or an error object, as written back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response<T> {
    Ok(T),
    Error { error: String },
}

impl<T> Response<T> {
    pub fn error(err: &RequestError) -> Self {
        Self::Error {
            error: err.to_string(),
        }
    }
}

/// Full request → response path for tracking.
pub fn handle(input: &str) -> Response<TrackingResult> {
    match parse_request(input) {
        Ok(request) => Response::Ok(request.track()),
        Err(err) => {
            tracing::warn!(error = %err, "rejected tracking request");
            Response::error(&err)
        }
    }
}

/// Full request → response path for flattening only.
pub fn handle_flatten(input: &str) -> Response<Vec<Event>> {
    match parse_request(input) {
        Ok(request) => Response::Ok(request.flatten()),
        Err(err) => {
            tracing::warn!(error = %err, "rejected flatten request");
            Response::error(&err)
        }
    }
}
