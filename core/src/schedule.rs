//! One day's schedule: validated intents plus the segments derived from them.
//!
//! Segments are always recomputed from intents; the schedule keeps no
//! history. Every mutating call computes the new state first and commits
//! it only on success, so a failed edit leaves the schedule untouched.

use crate::{
    config::RotaConfig,
    error::{RotaError, RotaResult},
    intent::{validate_gap, validate_shift, DayPlan, GapIntent, IntentDelta, ShiftIntent, MAX_MODIFIER, MIN_MODIFIER},
    normalizer::{is_disjoint, normalize_worker, AvailabilitySegment, ResolvedShift, SegmentSource},
    resolver::SkillResolver,
    roster::Roster,
    skill::SkillLevel,
    types::{ClockTime, IntentId, Modality, Skill, WorkerId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

type WorkerSegments = BTreeMap<Modality, Vec<AvailabilitySegment>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySchedule {
    pub day: NaiveDate,
    shifts: Vec<ShiftIntent>,
    gaps: Vec<GapIntent>,
    /// Next-day remainders of overnight intents.
    #[serde(default)]
    carry_over_shifts: Vec<ShiftIntent>,
    #[serde(default)]
    carry_over_gaps: Vec<GapIntent>,
    segments: BTreeMap<WorkerId, WorkerSegments>,
}

impl DaySchedule {
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            shifts: Vec::new(),
            gaps: Vec::new(),
            carry_over_shifts: Vec::new(),
            carry_over_gaps: Vec::new(),
            segments: BTreeMap::new(),
        }
    }

    /// Validate a day plan and derive all segments.
    pub fn build(plan: DayPlan, config: &RotaConfig, roster: &Roster) -> RotaResult<Self> {
        let mut schedule = Self::empty(plan.day);
        for shift in &plan.shifts {
            let (today, rest) = validate_shift(shift, config)?.into_parts();
            ensure_unique(&schedule.shifts, &today.id, |s| &s.id)?;
            schedule.shifts.push(today);
            schedule.carry_over_shifts.extend(rest);
        }
        for gap in &plan.gaps {
            let (today, rest) = validate_gap(gap, config)?.into_parts();
            ensure_unique(&schedule.gaps, &today.id, |g| &g.id)?;
            schedule.gaps.push(today);
            schedule.carry_over_gaps.extend(rest);
        }
        schedule.rebuild_all(config, roster)?;
        log::info!(
            "Schedule for {} built: {} shifts, {} gaps, {} workers",
            schedule.day,
            schedule.shifts.len(),
            schedule.gaps.len(),
            schedule.segments.len()
        );
        Ok(schedule)
    }

    /// Recompute every worker's segments.
    pub fn rebuild_all(&mut self, config: &RotaConfig, roster: &Roster) -> RotaResult<()> {
        let workers: BTreeSet<&str> = self.shifts.iter().map(|s| s.worker.as_str()).collect();
        let mut segments = BTreeMap::new();
        for worker in workers {
            let computed = compute_worker(worker, &self.shifts, &self.gaps, config, roster)?;
            if !computed.is_empty() {
                segments.insert(worker.to_string(), computed);
            }
        }
        self.segments = segments;
        Ok(())
    }

    /// Rebuild from roster + rules. Manual values that may not overwrite a
    /// roster exclusion are dropped. Returns the dropped (shift, skill) pairs.
    pub fn reload(&mut self, config: &RotaConfig, roster: &Roster) -> RotaResult<Vec<(IntentId, Skill)>> {
        let mut shifts = self.shifts.clone();
        let mut dropped = Vec::new();
        for shift in &mut shifts {
            let entry = roster.entry_or_default(&shift.worker);
            for skill in SkillResolver::new(&entry).prune_for_reload(shift) {
                log::info!(
                    "Manual value for {}/{skill} on shift '{}' dropped on reload",
                    shift.worker,
                    shift.id
                );
                dropped.push((shift.id.clone(), skill));
            }
        }
        let mut next = self.clone();
        next.shifts = shifts;
        next.rebuild_all(config, roster)?;
        *self = next;
        Ok(dropped)
    }

    /// Apply one edit and recompute only the affected worker.
    pub fn apply_edit(&mut self, delta: IntentDelta, config: &RotaConfig, roster: &Roster) -> RotaResult<WorkerId> {
        let mut shifts = self.shifts.clone();
        let mut gaps = self.gaps.clone();
        let mut carry_shifts = Vec::new();
        let mut carry_gaps = Vec::new();

        let worker = match delta {
            IntentDelta::AddShift { shift } => {
                let (today, rest) = validate_shift(&shift, config)?.into_parts();
                ensure_unique(&shifts, &today.id, |s| &s.id)?;
                carry_shifts.extend(rest);
                let worker = today.worker.clone();
                shifts.push(today);
                worker
            }
            IntentDelta::RemoveShift { id } => {
                let idx = find(&shifts, &id, |s| &s.id)?;
                shifts.remove(idx).worker
            }
            IntentDelta::AddGap { gap } => {
                let (today, rest) = validate_gap(&gap, config)?.into_parts();
                ensure_unique(&gaps, &today.id, |g| &g.id)?;
                carry_gaps.extend(rest);
                shifts = split_shifts_at_gap(shifts, &today);
                let worker = today.worker.clone();
                gaps.push(today);
                worker
            }
            IntentDelta::RemoveGap { id } => {
                // Fragments created when the gap was added stay as they are.
                let idx = find(&gaps, &id, |g| &g.id)?;
                gaps.remove(idx).worker
            }
            IntentDelta::SetSkill { shift_id, skill, value } => {
                config.require_skill(&skill)?;
                let idx = find(&shifts, &shift_id, |s| &s.id)?;
                let shift = &mut shifts[idx];
                shift.manual_overrides.insert(skill, value);
                shift.manual = true;
                shift.worker.clone()
            }
            IntentDelta::SetModifier { shift_id, modifier } => {
                if !(MIN_MODIFIER..=MAX_MODIFIER).contains(&modifier) {
                    return Err(RotaError::invalid_intent(
                        &shift_id,
                        format!("modifier {modifier} outside {MIN_MODIFIER}..={MAX_MODIFIER}"),
                    ));
                }
                let idx = find(&shifts, &shift_id, |s| &s.id)?;
                shifts[idx].modifier = modifier;
                shifts[idx].manual = true;
                shifts[idx].worker.clone()
            }
        };

        let computed = compute_worker(&worker, &shifts, &gaps, config, roster)?;
        self.shifts = shifts;
        self.gaps = gaps;
        self.carry_over_shifts.extend(carry_shifts);
        self.carry_over_gaps.extend(carry_gaps);
        if computed.is_empty() {
            self.segments.remove(&worker);
        } else {
            self.segments.insert(worker.clone(), computed);
        }
        log::debug!("Segments for '{worker}' recomputed after edit");
        Ok(worker)
    }

    pub fn shifts(&self) -> &[ShiftIntent] {
        &self.shifts
    }

    pub fn gaps(&self) -> &[GapIntent] {
        &self.gaps
    }

    /// Overnight remainders to feed into the next day's plan.
    pub fn carry_over_plan(&self) -> Option<DayPlan> {
        if self.carry_over_shifts.is_empty() && self.carry_over_gaps.is_empty() {
            return None;
        }
        Some(DayPlan {
            day: self.day.succ_opt()?,
            shifts: self.carry_over_shifts.clone(),
            gaps: self.carry_over_gaps.clone(),
        })
    }

    pub fn workers(&self) -> impl Iterator<Item = &WorkerId> {
        self.segments.keys()
    }

    pub fn worker_segments(&self, worker: &str, modality: &str) -> &[AvailabilitySegment] {
        self.segments
            .get(worker)
            .and_then(|m| m.get(modality))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All segments in `modality`, ordered by worker then start.
    pub fn segments_for(&self, modality: &str) -> Vec<AvailabilitySegment> {
        self.segments
            .values()
            .filter_map(|m| m.get(modality))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn all_segments(&self) -> impl Iterator<Item = &AvailabilitySegment> {
        self.segments.values().flat_map(|m| m.values()).flatten()
    }

    pub fn active_segment(&self, worker: &str, modality: &str, now: ClockTime) -> Option<&AvailabilitySegment> {
        self.worker_segments(worker, modality)
            .iter()
            .find(|s| s.window.contains(now))
    }

    /// Segments active at `now` in `modality`, one per worker, ordered by worker.
    pub fn active_in<'a>(&'a self, modality: &'a str, now: ClockTime) -> impl Iterator<Item = &'a AvailabilitySegment> + 'a {
        self.segments
            .values()
            .filter_map(move |m| m.get(modality))
            .filter_map(move |segs| segs.iter().find(|s| s.window.contains(now)))
    }

    /// Check stored segments against the invariants, e.g. after restoring a
    /// snapshot: segments are ordered and disjoint, and a roster exclusion is
    /// never lifted without a manual edit on the originating shift.
    pub fn check_invariants(&self, roster: &Roster) -> RotaResult<()> {
        for (worker, by_modality) in &self.segments {
            let entry = roster.entry(worker);
            for (modality, segments) in by_modality {
                if !is_disjoint(segments) {
                    return Err(invariant_violation(worker, "*", modality, "segments overlap or are out of order".into()));
                }
                let Some(entry) = entry else { continue };
                for segment in segments {
                    let SegmentSource::Shift(id) = &segment.source else { continue };
                    let shift = self.shifts.iter().find(|s| &s.id == id && &s.worker == worker);
                    for (skill, value) in &segment.skills {
                        if value.is_excluded() || entry.baseline(skill, modality) != SkillLevel::Excluded {
                            continue;
                        }
                        if shift.is_some_and(|s| s.manual_overrides.contains_key(skill)) {
                            continue;
                        }
                        return Err(invariant_violation(
                            worker,
                            skill,
                            modality,
                            format!("roster exclusion stored as {value:?} in segment from '{id}'"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn invariant_violation(worker: &str, skill: &str, modality: &str, detail: String) -> RotaError {
    let err = RotaError::InvariantViolation {
        worker: worker.to_string(),
        skill: skill.to_string(),
        modality: modality.to_string(),
        detail,
    };
    log::error!("{err}");
    err
}

/// Resolve and normalize one worker against the given intents.
fn compute_worker(
    worker: &str,
    shifts: &[ShiftIntent],
    gaps: &[GapIntent],
    config: &RotaConfig,
    roster: &Roster,
) -> RotaResult<WorkerSegments> {
    let entry = roster.entry_or_default(worker);
    let resolver = SkillResolver::new(&entry);
    let mut resolved = Vec::new();
    for intent in shifts.iter().filter(|s| s.worker == worker) {
        resolved.push(ResolvedShift {
            intent,
            skills: resolver.resolve_shift(intent, config.skill_slugs())?,
        });
    }
    let worker_gaps: Vec<&GapIntent> = gaps.iter().filter(|g| g.worker == worker).collect();
    Ok(normalize_worker(worker, &resolved, &worker_gaps))
}

/// Physically split the gap owner's shifts around the gap. A shift the gap
/// covers entirely is kept intact; the normalizer still excludes it.
/// Fragments are numbered `{id}.{n}`, skipping suffixes already in use.
fn split_shifts_at_gap(shifts: Vec<ShiftIntent>, gap: &GapIntent) -> Vec<ShiftIntent> {
    let gap_window = gap.window();
    let mut taken: BTreeSet<IntentId> = shifts.iter().map(|s| s.id.clone()).collect();
    let mut out = Vec::with_capacity(shifts.len() + 1);
    for shift in shifts {
        let affected = shift.worker == gap.worker
            && gap.scope.applies_to(&shift.modality)
            && shift.window().overlaps(&gap_window);
        let pieces = if affected { shift.window().subtract(&gap_window) } else { Vec::new() };
        if pieces.is_empty() {
            out.push(shift);
            continue;
        }
        let planned = shift.planned_window();
        let numbered = pieces.len() > 1;
        let mut suffix = 0;
        for piece in pieces {
            let mut fragment = shift.clone();
            if numbered {
                fragment.id = loop {
                    suffix += 1;
                    let candidate = format!("{}.{suffix}", shift.id);
                    if taken.insert(candidate.clone()) {
                        break candidate;
                    }
                };
            }
            fragment.start = piece.start;
            fragment.end = piece.end;
            fragment.split_from = Some(planned);
            out.push(fragment);
        }
    }
    out
}

fn ensure_unique<T>(items: &[T], id: &str, key: impl Fn(&T) -> &IntentId) -> RotaResult<()> {
    if items.iter().any(|item| key(item) == id) {
        return Err(RotaError::invalid_intent(id, "duplicate intent id"));
    }
    Ok(())
}

fn find<T>(items: &[T], id: &str, key: impl Fn(&T) -> &IntentId) -> RotaResult<usize> {
    items
        .iter()
        .position(|item| key(item) == id)
        .ok_or_else(|| RotaError::UnknownIntent { id: id.to_string() })
}
