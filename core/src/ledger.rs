//! Workload ledger: weighted assignment counts and hours worked.
//!
//! RULE: Only the engine mutates the ledger, through record_assignment,
//! accumulate_hours and reset. Schedule rebuilds and edits never touch it.

use crate::{
    config::ModifierPolicy,
    skill::SkillValue,
    types::{Modality, Skill, WorkerId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters for one (worker, skill, modality).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRecord {
    pub weighted_count: f64,
    pub hours_worked:   f64,
}

impl WorkloadRecord {
    /// Fairness ratio. With no hours: 0 if never assigned, +inf otherwise,
    /// so an assigned-but-hourless worker sorts after every worker with hours.
    pub fn ratio(&self) -> f64 {
        if self.hours_worked > 0.0 {
            self.weighted_count / self.hours_worked
        } else if self.weighted_count > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }
}

/// Hours are tracked per (worker, modality) and shared by every skill in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ModalityLedger {
    hours_worked:    f64,
    weighted_counts: BTreeMap<Skill, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadLedger {
    workers: BTreeMap<WorkerId, BTreeMap<Modality, ModalityLedger>>,
}

impl WorkloadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, worker: &str, modality: &str) -> &mut ModalityLedger {
        self.workers
            .entry(worker.to_string())
            .or_default()
            .entry(modality.to_string())
            .or_default()
    }

    pub fn record_assignment(&mut self, worker: &str, skill: &str, modality: &str, weight: f64) {
        *self
            .slot(worker, modality)
            .weighted_counts
            .entry(skill.to_string())
            .or_insert(0.0) += weight;
    }

    pub fn accumulate_hours(&mut self, worker: &str, modality: &str, hours: f64) {
        if hours > 0.0 {
            self.slot(worker, modality).hours_worked += hours;
        }
    }

    pub fn record(&self, worker: &str, skill: &str, modality: &str) -> WorkloadRecord {
        self.workers
            .get(worker)
            .and_then(|m| m.get(modality))
            .map(|slot| WorkloadRecord {
                weighted_count: slot.weighted_counts.get(skill).copied().unwrap_or(0.0),
                hours_worked: slot.hours_worked,
            })
            .unwrap_or_default()
    }

    pub fn ratio(&self, worker: &str, skill: &str, modality: &str) -> f64 {
        self.record(worker, skill, modality).ratio()
    }

    /// Sum of weighted counts for a worker across skills and modalities.
    pub fn total_weighted(&self, worker: &str) -> f64 {
        self.workers
            .get(worker)
            .map(|m| m.values().flat_map(|slot| slot.weighted_counts.values()).sum())
            .unwrap_or(0.0)
    }

    pub fn hours_worked(&self, worker: &str, modality: &str) -> f64 {
        self.workers
            .get(worker)
            .and_then(|m| m.get(modality))
            .map(|slot| slot.hours_worked)
            .unwrap_or(0.0)
    }

    pub fn workers(&self) -> impl Iterator<Item = &WorkerId> {
        self.workers.keys()
    }

    /// Zero every counter. Only a full reload calls this.
    pub fn reset(&mut self) {
        self.workers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

/// Ledger increment for one assignment:
/// `base × (1/global_modifier, per policy) × (1/w_modifier if Weighted)`.
pub fn assignment_weight(
    base_weight: f64,
    global_modifier: f64,
    value: SkillValue,
    policy: ModifierPolicy,
) -> f64 {
    let applies_global = match policy {
        ModifierPolicy::AllAssignments => true,
        ModifierPolicy::WeightedOnly => value.weighted_modifier().is_some(),
    };
    let mut weight = base_weight;
    if applies_global && global_modifier > 0.0 {
        weight /= global_modifier;
    }
    if let Some(w_modifier) = value.weighted_modifier().filter(|m| *m > 0.0) {
        weight /= w_modifier;
    }
    weight
}
