//! Snapshot serialization: schedule + ledger + clock to/from JSON.
//!
//! A snapshot captures everything needed to resume assignment after a
//! process restart without replaying the day.

use crate::{
    clock::DutyClock,
    error::RotaResult,
    ledger::WorkloadLedger,
    schedule::DaySchedule,
};
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RotaSnapshot {
    pub format_version: u32,
    pub clock: DutyClock,
    pub schedule: DaySchedule,
    pub ledger: WorkloadLedger,
}

impl RotaSnapshot {
    pub fn capture(clock: &DutyClock, schedule: &DaySchedule, ledger: &WorkloadLedger) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            clock: clock.clone(),
            schedule: schedule.clone(),
            ledger: ledger.clone(),
        }
    }

    pub fn to_json(&self) -> RotaResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> RotaResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
