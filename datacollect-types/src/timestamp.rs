//! Event timestamps and the per-user monotonic clock.
//!
//! Events carry a plain ISO-8601 UTC timestamp (no logical-clock pair —
//! this engine's ordering model is total order by `(timestamp, guid)`
//! per tenant, not causal/vector-clock ordering). The one clock concern
//! the spec calls out is that timestamps must be monotonic per user: a
//! burst of events from the same user at the same millisecond must
//! still compare distinctly for stable pagination tie-breaks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::UserId;

/// An ISO-8601 UTC event timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTimestamp(DateTime<Utc>);

impl EventTimestamp {
    /// Creates a timestamp at the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// The Unix epoch, used as the default cursor value when a sync
    /// direction has never completed a successful phase (i.e. "since
    /// the beginning of time").
    #[must_use]
    pub fn epoch() -> Self {
        Self(DateTime::from_timestamp(0, 0).expect("epoch is representable"))
    }

    /// Wraps an existing `DateTime<Utc>`.
    #[must_use]
    pub const fn new(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying `DateTime<Utc>`.
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Parses an RFC 3339 / ISO-8601 string.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc)))
    }

    /// Renders as an RFC 3339 string with millisecond precision.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }

    /// One millisecond later than `self`.
    #[must_use]
    pub fn next_millis(&self) -> Self {
        Self(self.0 + Duration::milliseconds(1))
    }
}

impl Default for EventTimestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl std::fmt::Display for EventTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for EventTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

/// Enforces "monotonic per user": the next timestamp handed to a given
/// user is always strictly greater than the last one issued to them,
/// even if physical time has not advanced (clock resolution, retries,
/// or a burst of submissions within the same millisecond).
///
/// Mirrors the teacher's `HybridTimestamp::tick` — advance with wall
/// time when it has moved forward, otherwise bump by the smallest
/// representable unit — but tracks state per user rather than per
/// replica, and has no logical-clock component in the stored value.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_issued: Mutex<HashMap<UserId, EventTimestamp>>,
}

impl MonotonicClock {
    /// Creates an empty clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a caller-supplied timestamp for `user`, bumping it
    /// forward if needed to preserve monotonicity, and records the
    /// result as the new high-water mark for that user.
    pub fn admit(&self, user: UserId, candidate: EventTimestamp) -> EventTimestamp {
        let mut last_issued = self.last_issued.lock().expect("monotonic clock poisoned");
        let admitted = match last_issued.get(&user) {
            Some(prev) if candidate <= *prev => prev.next_millis(),
            _ => candidate,
        };
        last_issued.insert(user, admitted);
        admitted
    }

    /// Returns the last timestamp admitted for `user`, if any.
    pub fn last_for(&self, user: &UserId) -> Option<EventTimestamp> {
        self.last_issued.lock().expect("monotonic clock poisoned").get(user).copied()
    }
}
