//! Roster: per-worker baseline skill levels and personal modifiers.
//!
//! The roster is owned by an external store; the engine only reads it.

use crate::{
    config::RotaConfig,
    error::{RotaError, RotaResult},
    skill::SkillLevel,
    types::{Modality, Skill, WorkerId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterEntry {
    pub worker: WorkerId,
    #[serde(default)]
    pub display_name: Option<String>,
    /// skill → modality → baseline level.
    #[serde(default)]
    pub skills: BTreeMap<Skill, BTreeMap<Modality, SkillLevel>>,
    #[serde(default = "one")]
    pub global_modifier: f64,
    #[serde(default = "one")]
    pub w_modifier: f64,
}

fn one() -> f64 {
    1.0
}

impl RosterEntry {
    pub fn new(worker: impl Into<WorkerId>) -> Self {
        Self {
            worker: worker.into(),
            display_name: None,
            skills: BTreeMap::new(),
            global_modifier: 1.0,
            w_modifier: 1.0,
        }
    }

    pub fn with_skill(mut self, skill: &str, modality: &str, level: SkillLevel) -> Self {
        self.skills
            .entry(skill.to_string())
            .or_default()
            .insert(modality.to_string(), level);
        self
    }

    pub fn with_modifiers(mut self, global_modifier: f64, w_modifier: f64) -> Self {
        self.global_modifier = global_modifier;
        self.w_modifier = w_modifier;
        self
    }

    /// Baseline for (skill, modality). Cells the roster leaves blank are generalist.
    pub fn baseline(&self, skill: &str, modality: &str) -> SkillLevel {
        self.skills
            .get(skill)
            .and_then(|by_modality| by_modality.get(modality))
            .copied()
            .unwrap_or(SkillLevel::Generalist)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Roster {
    entries: BTreeMap<WorkerId, RosterEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct RosterFile {
    workers: Vec<RosterEntry>,
}

impl Roster {
    pub fn new(entries: impl IntoIterator<Item = RosterEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.worker.clone(), e)).collect(),
        }
    }

    /// Load from a JSON roster file (`{"workers": [...]}`).
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: RosterFile = serde_json::from_str(&content)?;
        Ok(Self::new(file.workers))
    }

    pub fn entry(&self, worker: &str) -> Option<&RosterEntry> {
        self.entries.get(worker)
    }

    /// Entry for `worker`, or an all-default one if the roster does not list them.
    pub fn entry_or_default(&self, worker: &str) -> RosterEntry {
        self.entries.get(worker).cloned().unwrap_or_else(|| {
            log::warn!("Worker '{worker}' not in roster; using default baselines");
            RosterEntry::new(worker)
        })
    }

    pub fn upsert(&mut self, entry: RosterEntry) {
        self.entries.insert(entry.worker.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.values()
    }

    /// Reject unknown slugs and non-positive modifiers.
    pub fn validate(&self, config: &RotaConfig) -> RotaResult<()> {
        for entry in self.entries.values() {
            for (skill, by_modality) in &entry.skills {
                config.require_skill(skill)?;
                for modality in by_modality.keys() {
                    config.require_modality(modality)?;
                }
            }
            for (name, value) in [("global_modifier", entry.global_modifier), ("w_modifier", entry.w_modifier)] {
                if !(value > 0.0 && value.is_finite()) {
                    return Err(RotaError::invalid_config(format!(
                        "roster entry '{}' has invalid {name} {value}",
                        entry.worker
                    )));
                }
            }
        }
        Ok(())
    }
}
