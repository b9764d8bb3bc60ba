use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Text layout of every timestamp stored in a metadata hash.
pub const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Creation or registration time stored as a metadata hash value.
///
/// Millisecond precision, local wall-clock time, rendered with
/// [`STAMP_FORMAT`] (e.g. `2024-03-15 09:30:00.125`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stamp(NaiveDateTime);

impl Stamp {
    /// The current local time.
    pub fn now() -> Self {
        Self::from_local(Local::now())
    }

    fn from_local(t: DateTime<Local>) -> Self {
        let naive = t.naive_local();
        // Drop sub-millisecond precision so a stamp equals its parsed text.
        let ms = naive.nanosecond() / 1_000_000;
        Self(naive.with_nanosecond(ms * 1_000_000).unwrap_or(naive))
    }

    /// Render for storage.
    pub fn render(&self) -> String {
        self.0.format(STAMP_FORMAT).to_string()
    }

    /// Parse a stored value.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        NaiveDateTime::parse_from_str(s, STAMP_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
            .map(Self)
            .map_err(|e| TypeError::InvalidTimestamp(format!("{s:?}: {e}")))
    }
}

impl FromStr for Stamp {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stamp({})", self.render())
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
