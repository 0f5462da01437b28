// This file is part of Opline.
//
// Opline is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Opline is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Opline.
// If not, see https://www.gnu.org/licenses/.

//! Second-resolution time types for user operation validity windows.

use std::{
    fmt,
    fmt::{Debug, Display, Formatter},
    ops::{Add, AddAssign, Sub, SubAssign},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use alloy_primitives::U64;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seconds since the Unix epoch, at the resolution the entry point
/// contracts understand time: block timestamps, `valid_after`, and
/// `valid_until` are all whole seconds.
///
/// Arithmetic with a `Duration` saturates at the numeric bounds. The
/// validation data codec produces `2^48 - 1` style "never expires"
/// sentinels, and those must survive margin arithmetic unchanged.
///
/// Serializes as a hex quantity. Displays as a UTC datetime where one
/// exists for the value.
#[derive(Clone, Copy, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The earliest representable timestamp, the epoch itself
    pub const MIN: Timestamp = Timestamp(u64::MIN);
    /// The latest representable timestamp
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    /// Wrap a number of seconds since the epoch
    pub fn new(seconds_since_epoch: u64) -> Self {
        Self(seconds_since_epoch)
    }

    /// The current wall clock time, truncated to whole seconds
    pub fn now() -> Self {
        Self(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_secs(),
        )
    }

    /// The wrapped number of seconds since the epoch
    pub fn seconds_since_epoch(self) -> u64 {
        self.0
    }
}

impl From<u64> for Timestamp {
    fn from(seconds: u64) -> Self {
        Self(seconds)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Self;

    fn add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_secs()))
    }
}

impl AddAssign<Duration> for Timestamp {
    fn add_assign(&mut self, duration: Duration) {
        *self = *self + duration;
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Self;

    fn sub(self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration.as_secs()))
    }
}

impl SubAssign<Duration> for Timestamp {
    fn sub_assign(&mut self, duration: Duration) {
        *self = *self - duration;
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match DateTime::<Utc>::try_from(*self) {
            Ok(datetime) => Display::fmt(&datetime, f),
            Err(_) => write!(f, "{} seconds since epoch (beyond datetime range)", self.0),
        }
    }
}

impl Debug for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}, {})", self.0, self)
    }
}

impl TryFrom<Timestamp> for DateTime<Utc> {
    type Error = TimestampOutOfRange;

    fn try_from(value: Timestamp) -> Result<Self, Self::Error> {
        i64::try_from(value.0)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or(TimestampOutOfRange)
    }
}

/// A timestamp too far in the future to express as a [`DateTime`]
#[derive(Clone, Copy, Debug, thiserror::Error)]
#[error("timestamp is out of range for a datetime")]
pub struct TimestampOutOfRange;

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        U64::from(self.0).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        U64::deserialize(deserializer).map(|value| Self(value.to::<u64>()))
    }
}

/// The `[valid_after, valid_until]` window, inclusive on both ends, during
/// which an operation may be included.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValidTimeRange {
    /// First second the operation is valid
    pub valid_after: Timestamp,
    /// Last second the operation is valid
    pub valid_until: Timestamp,
}

impl ValidTimeRange {
    /// Create a window from its two bounds
    pub fn new(valid_after: Timestamp, valid_until: Timestamp) -> Self {
        Self {
            valid_after,
            valid_until,
        }
    }

    /// Whether `now` sits inside the window with at least `buffer` time
    /// left before it closes
    pub fn contains(self, now: Timestamp, buffer: Duration) -> bool {
        self.valid_after <= now && now + buffer <= self.valid_until
    }

    /// The window during which both `self` and `other` are valid
    pub fn intersect(self, other: Self) -> Self {
        Self {
            valid_after: self.valid_after.max(other.valid_after),
            valid_until: self.valid_until.min(other.valid_until),
        }
    }
}

impl Default for ValidTimeRange {
    /// The unbounded window, valid at any time
    fn default() -> Self {
        Self {
            valid_after: Timestamp::MIN,
            valid_until: Timestamp::MAX,
        }
    }
}
