//! Skill values.
//!
//! Raw cells from rosters, rule tables and manual edits come in as `-1`, `0`,
//! `1` or `"w"`. They cross into the engine exactly once, through
//! `SkillLevel::from_raw`, and are never compared as raw values afterwards.
//!
//! `SkillLevel` is the input tier. `SkillValue` is the resolved form carried
//! by segments, where `Weighted` holds the worker's effective modifier.

use crate::error::{RotaError, RotaResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw skill cell as it appears in JSON/CSV input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSkill {
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSkill", into = "RawSkill")]
pub enum SkillLevel {
    Excluded,
    Generalist,
    Specialist,
    Weighted,
}

impl SkillLevel {
    pub const ALL: [SkillLevel; 4] = [
        SkillLevel::Excluded,
        SkillLevel::Generalist,
        SkillLevel::Specialist,
        SkillLevel::Weighted,
    ];

    /// The single normalization boundary for skill cells.
    pub fn from_raw(raw: &RawSkill) -> RotaResult<Self> {
        match raw {
            RawSkill::Int(-1) => Ok(Self::Excluded),
            RawSkill::Int(0) => Ok(Self::Generalist),
            RawSkill::Int(1) => Ok(Self::Specialist),
            RawSkill::Int(other) => Err(RotaError::InvalidSkillValue {
                value: other.to_string(),
            }),
            RawSkill::Text(text) => match text.trim() {
                "-1" => Ok(Self::Excluded),
                "0" => Ok(Self::Generalist),
                "1" => Ok(Self::Specialist),
                "w" | "W" => Ok(Self::Weighted),
                other => Err(RotaError::InvalidSkillValue {
                    value: other.to_string(),
                }),
            },
        }
    }

    pub fn to_raw(self) -> RawSkill {
        match self {
            Self::Excluded => RawSkill::Int(-1),
            Self::Generalist => RawSkill::Int(0),
            Self::Specialist => RawSkill::Int(1),
            Self::Weighted => RawSkill::Text("w".into()),
        }
    }
}

impl TryFrom<RawSkill> for SkillLevel {
    type Error = RotaError;

    fn try_from(raw: RawSkill) -> RotaResult<Self> {
        Self::from_raw(&raw)
    }
}

impl From<SkillLevel> for RawSkill {
    fn from(level: SkillLevel) -> Self {
        level.to_raw()
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excluded => write!(f, "-1"),
            Self::Generalist => write!(f, "0"),
            Self::Specialist => write!(f, "1"),
            Self::Weighted => write!(f, "w"),
        }
    }
}

/// Resolved proficiency of one worker for one (skill, modality).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillValue {
    Excluded,
    Generalist,
    Specialist,
    Weighted { modifier: f64 },
}

impl SkillValue {
    /// Attach the worker's `w_modifier` to a resolved level.
    pub fn from_level(level: SkillLevel, w_modifier: f64) -> Self {
        match level {
            SkillLevel::Excluded => Self::Excluded,
            SkillLevel::Generalist => Self::Generalist,
            SkillLevel::Specialist => Self::Specialist,
            SkillLevel::Weighted => Self::Weighted {
                modifier: w_modifier,
            },
        }
    }

    pub fn level(&self) -> SkillLevel {
        match self {
            Self::Excluded => SkillLevel::Excluded,
            Self::Generalist => SkillLevel::Generalist,
            Self::Specialist => SkillLevel::Specialist,
            Self::Weighted { .. } => SkillLevel::Weighted,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, Self::Excluded)
    }

    /// Specialists and trainees share the specialist pool.
    pub fn is_specialist(&self) -> bool {
        matches!(self, Self::Specialist | Self::Weighted { .. })
    }

    pub fn is_generalist(&self) -> bool {
        matches!(self, Self::Generalist)
    }

    pub fn weighted_modifier(&self) -> Option<f64> {
        match self {
            Self::Weighted { modifier } => Some(*modifier),
            _ => None,
        }
    }
}
