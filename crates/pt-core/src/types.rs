//! Core type definitions with validation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A numeric value was NaN or infinite.
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    /// The TTL was zero or negative.
    #[error("ttl must be positive, got {value}")]
    NonPositiveTtl { value: f64 },

    /// A connect/disconnect event lacked its user or device.
    #[error("'{kind}' event is missing required field '{field}'")]
    MissingPresenceField {
        kind: &'static str,
        field: &'static str,
    },
}

/// Writes integral values as JSON integers so that `2.0` stays `2` on the wire.
#[expect(
    clippy::cast_possible_truncation,
    reason = "integral values below 2^53 convert to i64 exactly"
)]
fn serialize_number<S>(value: f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    // 2^53: beyond this f64 cannot hold every integer exactly.
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        serializer.serialize_i64(value as i64)
    } else {
        serializer.serialize_f64(value)
    }
}

fn finite(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NonFinite { field, value })
    }
}

/// A point on the event timeline.
///
/// The unit is whatever the event source uses; the tracker only relies on
/// timestamps being comparable and subtractable.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Deserialize)]
#[serde(try_from = "f64")]
pub struct Timestamp(f64);

impl Timestamp {
    /// Creates a timestamp, rejecting NaN and infinities.
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        finite("timestamp", value).map(Self)
    }

    /// Returns the raw numeric value.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Total ordering used for stable sorting.
    pub fn total_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl TryFrom<f64> for Timestamp {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_number(self.0, serializer)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A length of time between two timestamps.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(try_from = "f64")]
pub struct Span(f64);

impl Span {
    /// The empty span.
    pub const ZERO: Self = Self(0.0);

    /// Creates a span, rejecting NaN and infinities.
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        finite("span", value).map(Self)
    }

    /// Returns the raw numeric value.
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Span {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Serialize for Span {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_number(self.0, serializer)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Sub for Timestamp {
    type Output = Span;

    fn sub(self, rhs: Self) -> Span {
        Span(self.0 - rhs.0)
    }
}

impl Add<Span> for Timestamp {
    type Output = Self;

    fn add(self, rhs: Span) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Span {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

/// Maximum gap between heartbeats of one device before it is presumed gone.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "Span")]
pub struct Ttl(Span);

impl Ttl {
    /// Creates a TTL after checking it is finite and strictly positive.
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        let span = Span::new(value)?;
        if span.0 <= 0.0 {
            return Err(ValidationError::NonPositiveTtl { value });
        }
        Ok(Self(span))
    }

    /// The TTL as a plain span.
    pub const fn span(self) -> Span {
        self.0
    }

    /// Offset from the last heartbeat at which an inferred disconnect is placed.
    pub fn half(self) -> Span {
        Span(self.0.0 / 2.0)
    }
}

impl TryFrom<f64> for Ttl {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ttl> for Span {
    fn from(ttl: Ttl) -> Self {
        ttl.0
    }
}

/// Identifier of one device's connect/disconnect heartbeat stream.
///
/// Any string is accepted, including the empty one; devices are only ever
/// compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of a person holding one or more device connections.
///
/// Event sources send either numeric or string user IDs; the value is kept
/// in the shape it arrived in so it serializes back unchanged. Numbers
/// compare by value, so `1` and `1.0` are the same user, while `1` and `"1"`
/// are not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(serde_json::Number),
    Text(String),
}

/// Canonical form of a numeric user ID used for equality and hashing.
#[derive(PartialEq, Eq, Hash)]
enum NumberKey {
    Integer(i128),
    Float(u64),
}

impl NumberKey {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "only integral floats well inside the i128 range are cast"
    )]
    fn of(number: &serde_json::Number) -> Self {
        if let Some(id) = number.as_i64() {
            return Self::Integer(i128::from(id));
        }
        if let Some(id) = number.as_u64() {
            return Self::Integer(i128::from(id));
        }
        let value = number.as_f64().unwrap_or(f64::NAN);
        if value.fract() == 0.0 && value.abs() < 1e38 {
            Self::Integer(value as i128)
        } else {
            Self::Float(value.to_bits())
        }
    }
}

impl PartialEq for UserId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => NumberKey::of(a) == NumberKey::of(b),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for UserId {}

impl Hash for UserId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Number(id) => NumberKey::of(id).hash(state),
            Self::Text(id) => id.hash(state),
        }
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self::Number(id.into())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}
