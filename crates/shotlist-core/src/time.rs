//! Time spans in seconds and timecode formatting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed time interval `[start, end]` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    /// Start time (inclusive)
    pub start: f64,
    /// End time (inclusive)
    pub end: f64,
}

impl TimeSpan {
    /// Create a time span. Callers are responsible for `start <= end`.
    #[inline]
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// A zero-length span at `t`.
    #[inline]
    pub fn instant(t: f64) -> Self {
        Self { start: t, end: t }
    }

    #[inline]
    pub fn duration(self) -> f64 {
        self.end - self.start
    }

    #[inline]
    pub fn midpoint(self) -> f64 {
        (self.start + self.end) / 2.0
    }

    /// Check if a time is within this span (both ends inclusive).
    #[inline]
    pub fn contains(self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    /// The span grown by `slack` seconds on both sides.
    #[inline]
    pub fn widen(self, slack: f64) -> Self {
        Self {
            start: self.start - slack,
            end: self.end + slack,
        }
    }

    /// True if the spans overlap or the gap between them is at most `gap`.
    pub fn touches(self, other: Self, gap: f64) -> bool {
        self.start <= other.end + gap && other.start <= self.end + gap
    }

    /// Smallest span covering both.
    pub fn union(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            format_timecode(self.start),
            format_timecode(self.end)
        )
    }
}

/// Round seconds to whole milliseconds. Negative input clamps to zero.
#[inline]
pub fn seconds_to_millis(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

/// Format seconds as `HH:MM:SS.mmm`.
pub fn format_timecode(seconds: f64) -> String {
    let ms = seconds_to_millis(seconds);
    let (s, ms_part) = (ms / 1000, ms % 1000);
    let (m, s) = (s / 60, s % 60);
    let (h, m) = (m / 60, m % 60);
    format!("{h:02}:{m:02}:{s:02}.{ms_part:03}")
}
