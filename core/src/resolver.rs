//! Skill resolution.
//!
//! PRECEDENCE (fixed):
//!   1. Roster baseline
//!   2. Rule override (already matched by ingestion; we only see the value)
//!   3. Manual same-day edit: unrestricted, skips the combination table
//!
//! Combination of roster + rule when no manual edit is present:
//!
//!   roster      override        result
//!   ---------   -------------   ---------
//!   Excluded    any / none      Excluded
//!   Weighted    Specialist      Weighted
//!   Weighted    Weighted        Weighted
//!   Weighted    Generalist      Excluded
//!   Weighted    Excluded        Excluded
//!   Weighted    none            Excluded
//!   Gen/Spec    X               X
//!   Gen/Spec    none            roster
//!
//! RULE: a roster exclusion only ever yields something other than Excluded
//! through a manual edit. Any other path is an InvariantViolation.

use crate::{
    error::{RotaError, RotaResult},
    intent::ShiftIntent,
    roster::RosterEntry,
    skill::{SkillLevel, SkillValue},
    types::Skill,
};
use std::collections::BTreeMap;

/// Resolved skill map for one segment.
pub type SkillMap = BTreeMap<Skill, SkillValue>;

/// The three layered sources for one (worker, skill, modality).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkillSources {
    pub roster: SkillLevel,
    pub rule_override: Option<SkillLevel>,
    pub manual: Option<SkillLevel>,
}

impl SkillSources {
    pub fn roster_only(roster: SkillLevel) -> Self {
        Self {
            roster,
            rule_override: None,
            manual: None,
        }
    }
}

/// Combine roster baseline with a rule override (no manual edit).
pub fn combine(roster: SkillLevel, rule_override: Option<SkillLevel>) -> SkillLevel {
    use SkillLevel::*;
    match (roster, rule_override) {
        (Excluded, _) => Excluded,
        (Weighted, Some(Specialist | Weighted)) => Weighted,
        (Weighted, Some(Generalist | Excluded) | None) => Excluded,
        (Generalist | Specialist, Some(value)) => value,
        (Generalist | Specialist, None) => roster,
    }
}

/// Pure resolution of one cell. Identical sources always give the same level.
pub fn resolve_level(sources: SkillSources) -> SkillLevel {
    match sources.manual {
        Some(manual) => manual,
        None => combine(sources.roster, sources.rule_override),
    }
}

/// Whether a manual value may be carried over when the day is rebuilt from
/// roster + rules. Over a roster exclusion only Specialist or Weighted survive.
pub fn survives_reload(roster: SkillLevel, manual: SkillLevel) -> bool {
    roster != SkillLevel::Excluded || matches!(manual, SkillLevel::Specialist | SkillLevel::Weighted)
}

/// Resolves per-shift skill maps against one roster entry.
pub struct SkillResolver<'a> {
    entry: &'a RosterEntry,
}

impl<'a> SkillResolver<'a> {
    pub fn new(entry: &'a RosterEntry) -> Self {
        Self { entry }
    }

    pub fn sources(&self, shift: &ShiftIntent, skill: &str) -> SkillSources {
        SkillSources {
            roster: self.entry.baseline(skill, &shift.modality),
            rule_override: shift.rule_overrides.get(skill).copied(),
            manual: shift.manual_overrides.get(skill).copied(),
        }
    }

    /// Effective value for one skill of one shift.
    pub fn resolve(&self, shift: &ShiftIntent, skill: &str) -> RotaResult<SkillValue> {
        let sources = self.sources(shift, skill);
        let level = resolve_level(sources);
        if sources.roster == SkillLevel::Excluded && sources.manual.is_none() && level != SkillLevel::Excluded {
            let err = RotaError::InvariantViolation {
                worker: self.entry.worker.clone(),
                skill: skill.to_string(),
                modality: shift.modality.clone(),
                detail: format!("roster exclusion resolved to {level} without a manual edit"),
            };
            log::error!("{err}");
            return Err(err);
        }
        Ok(SkillValue::from_level(level, self.entry.w_modifier))
    }

    /// Resolve every catalog skill for `shift`.
    pub fn resolve_shift<'s>(
        &self,
        shift: &ShiftIntent,
        skills: impl IntoIterator<Item = &'s str>,
    ) -> RotaResult<SkillMap> {
        skills
            .into_iter()
            .map(|skill| -> RotaResult<(Skill, SkillValue)> { Ok((skill.to_string(), self.resolve(shift, skill)?)) })
            .collect()
    }

    /// Drop manual values that do not survive a rebuild. Returns the dropped skills.
    pub fn prune_for_reload(&self, shift: &mut ShiftIntent) -> Vec<Skill> {
        let entry = self.entry;
        let modality = shift.modality.clone();
        let mut dropped = Vec::new();
        shift.manual_overrides.retain(|skill, manual| {
            let keep = survives_reload(entry.baseline(skill, &modality), *manual);
            if !keep {
                dropped.push(skill.clone());
            }
            keep
        });
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SkillLevel::*;

    #[test]
    fn trainee_without_rule_is_excluded() {
        assert_eq!(combine(Weighted, None), Excluded);
        assert_eq!(combine(Weighted, Some(Generalist)), Excluded);
        assert_eq!(combine(Weighted, Some(Specialist)), Weighted);
    }

    #[test]
    fn plain_override_replaces_baseline() {
        assert_eq!(combine(Generalist, Some(Specialist)), Specialist);
        assert_eq!(combine(Specialist, Some(Excluded)), Excluded);
        assert_eq!(combine(Specialist, None), Specialist);
    }

    #[test]
    fn manual_generalist_does_not_survive_reload_over_exclusion() {
        assert!(!survives_reload(Excluded, Generalist));
        assert!(survives_reload(Excluded, Specialist));
        assert!(survives_reload(Excluded, Weighted));
        assert!(survives_reload(Generalist, Generalist));
    }
}
