//! Duration value object for recording limits

use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use crate::domain::error::DurationParseError;

/// Value object representing a recording length.
/// Immutable, non-zero and validated on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration {
    milliseconds: u64,
}

impl Duration {
    /// Create a Duration from milliseconds
    pub const fn from_millis(ms: u64) -> Self {
        Self { milliseconds: ms }
    }

    /// Create a Duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            milliseconds: secs * 1000,
        }
    }

    /// Get duration in whole seconds
    pub const fn as_secs(&self) -> u64 {
        self.milliseconds / 1000
    }

    /// Get duration in milliseconds
    pub const fn as_millis(&self) -> u64 {
        self.milliseconds
    }

    /// Convert to std::time::Duration
    pub const fn as_std(&self) -> StdDuration {
        StdDuration::from_millis(self.milliseconds)
    }
}

impl FromStr for Duration {
    type Err = DurationParseError;

    /// Parse strings such as "500ms", "30s", "1m" or "2m30s"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DurationParseError {
            input: s.to_string(),
        };
        let input = s.trim().to_lowercase();

        let mut total_ms: u64 = 0;
        let mut rest = input.as_str();
        let mut found_any = false;

        while !rest.is_empty() {
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                return Err(invalid());
            }
            let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
            rest = &rest[digits..];

            let (unit_ms, unit_len) = if rest.starts_with("ms") {
                (1, 2)
            } else if rest.starts_with('s') {
                (1000, 1)
            } else if rest.starts_with('m') {
                (60_000, 1)
            } else {
                return Err(invalid());
            };
            rest = &rest[unit_len..];

            total_ms = value
                .checked_mul(unit_ms)
                .and_then(|ms| total_ms.checked_add(ms))
                .ok_or_else(invalid)?;
            found_any = true;
        }

        if !found_any || total_ms == 0 {
            return Err(invalid());
        }

        Ok(Self {
            milliseconds: total_ms,
        })
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.milliseconds % 1000 != 0 {
            return write!(f, "{}ms", self.milliseconds);
        }

        let total_secs = self.as_secs();
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;

        if minutes == 0 {
            write!(f, "{}s", seconds)
        } else if seconds == 0 {
            write!(f, "{}m", minutes)
        } else {
            write!(f, "{}m{}s", minutes, seconds)
        }
    }
}
