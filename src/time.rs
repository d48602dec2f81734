//! Time-of-day values used throughout the routing model

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{RoutingError, RoutingResult};

pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 3600;
pub const SECONDS_PER_DAY: i64 = SECONDS_PER_HOUR * 24;

/// A time of day with one-second precision, stored as seconds since midnight.
///
/// There is no calendar and no time zone; all routing happens within a single
/// workday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoutingTime(i64);

impl RoutingTime {
    /// Build from hour/minute/second components
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> RoutingResult<Self> {
        if hour >= 24 || minute >= 60 || second >= 60 {
            return Err(RoutingError::InputFormat(format!(
                "Invalid time components: {hour:02}:{minute:02}:{second:02}"
            )));
        }
        Ok(Self(
            i64::from(hour) * SECONDS_PER_HOUR
                + i64::from(minute) * SECONDS_PER_MINUTE
                + i64::from(second),
        ))
    }

    /// Build from a second count, wrapping into a single day
    pub fn from_seconds(seconds: i64) -> Self {
        Self(seconds.rem_euclid(SECONDS_PER_DAY))
    }

    /// Parse an ISO-8601 time of day, `HH:MM` or `HH:MM:SS`
    pub fn parse(value: &str) -> RoutingResult<Self> {
        let parts: Vec<&str> = value.trim().split(':').collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err(RoutingError::InputFormat(format!(
                "Invalid time: '{value}'. Expected 'HH:MM' or 'HH:MM:SS'"
            )));
        }
        let mut components = [0u32; 3];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = part.parse::<u32>().map_err(|_| {
                RoutingError::InputFormat(format!("Invalid time component '{part}' in '{value}'"))
            })?;
        }
        Self::from_hms(components[0], components[1], components[2])
    }

    pub fn seconds(self) -> i64 {
        self.0
    }

    pub fn hour(self) -> u32 {
        (self.0 / SECONDS_PER_HOUR) as u32
    }

    pub fn minute(self) -> u32 {
        ((self.0 % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE) as u32
    }

    pub fn second(self) -> u32 {
        (self.0 % SECONDS_PER_MINUTE) as u32
    }

    /// Seconds from `self` forward to `other`
    pub fn duration_until(self, other: RoutingTime) -> i64 {
        other.0 - self.0
    }

    /// Seconds from `other` forward to `self`
    pub fn duration_after(self, other: RoutingTime) -> i64 {
        self.0 - other.0
    }
}

impl fmt::Display for RoutingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hour = self.hour();
        let meridiem = if hour < 12 { "am" } else { "pm" };
        let hour12 = match hour % 12 {
            0 => 12,
            h => h,
        };
        write!(
            f,
            "{}:{:02}:{:02} {}",
            hour12,
            self.minute(),
            self.second(),
            meridiem
        )
    }
}
