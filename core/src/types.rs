//! Shared primitive types used across the rota engine.

use crate::error::{RotaError, RotaResult};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A stable, unique identifier for a worker (the roster key).
pub type WorkerId = String;

/// Skill slug from the skill catalog, e.g. `"cardiac"`.
pub type Skill = String;

/// Modality slug from the modality catalog, e.g. `"ct"`.
pub type Modality = String;

/// Identifier of a shift or gap intent within one day.
pub type IntentId = String;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Wall-clock time within one day, minute resolution.
/// `24:00` is representable so a window can run to the end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ClockTime(u16);

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime(0);
    pub const END_OF_DAY: ClockTime = ClockTime(MINUTES_PER_DAY);

    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes <= MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        Self::from_minutes(hour.checked_mul(60)?.checked_add(minute)?)
    }

    pub fn from_naive(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn plus_minutes(self, minutes: u16) -> Self {
        Self(self.0.saturating_add(minutes).min(MINUTES_PER_DAY))
    }

    pub fn minus_minutes(self, minutes: u16) -> Self {
        Self(self.0.saturating_sub(minutes))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for ClockTime {
    type Err = RotaError;

    fn from_str(s: &str) -> RotaResult<Self> {
        let s = s.trim();
        if s == "24:00" {
            return Ok(Self::END_OF_DAY);
        }
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map(Self::from_naive)
            .map_err(|e| RotaError::InvalidTime {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Half-open interval `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeWindow {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }

    /// Convenience constructor from `HH:MM` strings.
    pub fn parse(start: &str, end: &str) -> RotaResult<Self> {
        Ok(Self::new(start.parse()?, end.parse()?))
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end.minutes().saturating_sub(self.start.minutes())
    }

    pub fn hours(&self) -> f64 {
        self.duration_minutes() as f64 / 60.0
    }

    pub fn contains(&self, t: ClockTime) -> bool {
        self.start <= t && t < self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersect(&self, other: &TimeWindow) -> Option<TimeWindow> {
        let w = TimeWindow::new(self.start.max(other.start), self.end.min(other.end));
        (!w.is_empty()).then_some(w)
    }

    /// `self` minus `other`: zero, one or two pieces, in time order.
    pub fn subtract(&self, other: &TimeWindow) -> Vec<TimeWindow> {
        if !self.overlaps(other) {
            return vec![*self];
        }
        let mut pieces = Vec::with_capacity(2);
        let left = TimeWindow::new(self.start, other.start.min(self.end));
        if !left.is_empty() {
            pieces.push(left);
        }
        let right = TimeWindow::new(other.end.max(self.start), self.end);
        if !right.is_empty() {
            pieces.push(right);
        }
        pieces
    }

    /// `self` minus every window in `others`.
    pub fn subtract_all<'a>(&self, others: impl IntoIterator<Item = &'a TimeWindow>) -> Vec<TimeWindow> {
        let mut remaining = vec![*self];
        for other in others {
            remaining = remaining.iter().flat_map(|w| w.subtract(other)).collect();
            if remaining.is_empty() {
                break;
            }
        }
        remaining
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Sort and coalesce overlapping or touching windows.
pub fn merge_windows(mut windows: Vec<TimeWindow>) -> Vec<TimeWindow> {
    windows.retain(|w| !w.is_empty());
    windows.sort();
    let mut merged: Vec<TimeWindow> = Vec::with_capacity(windows.len());
    for w in windows {
        match merged.last_mut() {
            Some(last) if w.start <= last.end => last.end = last.end.max(w.end),
            _ => merged.push(w),
        }
    }
    merged
}
