//! rota-core: skill-aware staff assignment for a single duty day.
//!
//! Data flow: roster + intents → `resolver` → `normalizer` → `schedule`,
//! then `balancer` picks workers against the `ledger`. `engine::Rota`
//! owns all of it behind one lock.

pub mod balancer;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod intent;
pub mod ledger;
pub mod normalizer;
pub mod resolver;
pub mod roster;
pub mod schedule;
pub mod skill;
pub mod snapshot;
pub mod store;
pub mod types;

pub use balancer::{AssignOutcome, AssignmentResult, Fallback};
pub use config::RotaConfig;
pub use engine::Rota;
pub use error::{ErrorKind, RotaError, RotaResult};
pub use intent::{DayPlan, GapIntent, GapScope, IntentDelta, ShiftIntent};
pub use roster::{Roster, RosterEntry};
pub use skill::{SkillLevel, SkillValue};
pub use types::{ClockTime, TimeWindow};
