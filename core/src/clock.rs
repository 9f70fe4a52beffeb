//! Duty clock: owns the current day and time of day.
//!
//! Hours worked are derived from clock movement, never from wall time
//! directly, so replays and tests are deterministic.

use crate::{
    error::{RotaError, RotaResult},
    types::{ClockTime, TimeWindow},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DutyClock {
    pub day: NaiveDate,
    pub now: ClockTime,
}

impl DutyClock {
    /// Clock at the start of `day`.
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            now: ClockTime::MIDNIGHT,
        }
    }

    /// Move forward to `to`. Returns the elapsed window `[previous, to)`.
    pub fn advance_to(&mut self, to: ClockTime) -> RotaResult<TimeWindow> {
        if to < self.now {
            return Err(RotaError::ClockRewind {
                from: self.now.to_string(),
                to: to.to_string(),
            });
        }
        let elapsed = TimeWindow::new(self.now, to);
        self.now = to;
        Ok(elapsed)
    }
}
