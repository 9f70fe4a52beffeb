//! Shift and gap intents: the raw, per-day input to the schedule.
//!
//! Intents come from CSV ingestion or manual prep-page edits. They are
//! validated here and nowhere else; the normalizer assumes valid windows.

use crate::{
    config::{OvernightPolicy, RotaConfig},
    error::{RotaError, RotaResult},
    skill::SkillLevel,
    types::{ClockTime, IntentId, Modality, Skill, TimeWindow, WorkerId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const MIN_MODIFIER: f64 = 0.5;
pub const MAX_MODIFIER: f64 = 1.5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShiftIntent {
    pub id: IntentId,
    pub worker: WorkerId,
    pub modality: Modality,
    pub start: ClockTime,
    pub end: ClockTime,
    /// Values produced by the rule layer for this shift.
    #[serde(default)]
    pub rule_overrides: BTreeMap<Skill, SkillLevel>,
    /// Same-day manual edits.
    #[serde(default)]
    pub manual_overrides: BTreeMap<Skill, SkillLevel>,
    #[serde(default = "default_modifier")]
    pub modifier: f64,
    #[serde(default = "default_counts")]
    pub counts_for_hours: bool,
    /// Shift was created or edited by hand rather than ingested.
    #[serde(default)]
    pub manual: bool,
    /// Window of the shift this one was split from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_from: Option<TimeWindow>,
}

fn default_modifier() -> f64 {
    1.0
}

fn default_counts() -> bool {
    true
}

impl ShiftIntent {
    pub fn new(
        id: impl Into<IntentId>,
        worker: impl Into<WorkerId>,
        modality: impl Into<Modality>,
        window: TimeWindow,
    ) -> Self {
        Self {
            id: id.into(),
            worker: worker.into(),
            modality: modality.into(),
            start: window.start,
            end: window.end,
            rule_overrides: BTreeMap::new(),
            manual_overrides: BTreeMap::new(),
            modifier: 1.0,
            counts_for_hours: true,
            manual: false,
            split_from: None,
        }
    }

    pub fn with_rule(mut self, skill: &str, level: SkillLevel) -> Self {
        self.rule_overrides.insert(skill.to_string(), level);
        self
    }

    pub fn with_manual(mut self, skill: &str, level: SkillLevel) -> Self {
        self.manual_overrides.insert(skill.to_string(), level);
        self.manual = true;
        self
    }

    pub fn with_modifier(mut self, modifier: f64) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn not_counting_hours(mut self) -> Self {
        self.counts_for_hours = false;
        self
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    /// The window the shift was originally planned with, before any edit split it.
    pub fn planned_window(&self) -> TimeWindow {
        self.split_from.unwrap_or_else(|| self.window())
    }
}

/// Which modalities a gap blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GapScope {
    All,
    Modalities(BTreeSet<Modality>),
}

impl GapScope {
    pub fn applies_to(&self, modality: &str) -> bool {
        match self {
            Self::All => true,
            Self::Modalities(set) => set.contains(modality),
        }
    }
}

/// Unavailability (meeting, board, break). Every skill is excluded for its window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GapIntent {
    pub id: IntentId,
    pub worker: WorkerId,
    pub scope: GapScope,
    pub start: ClockTime,
    pub end: ClockTime,
    #[serde(default)]
    pub reason: Option<String>,
}

impl GapIntent {
    pub fn new(
        id: impl Into<IntentId>,
        worker: impl Into<WorkerId>,
        scope: GapScope,
        window: TimeWindow,
    ) -> Self {
        Self {
            id: id.into(),
            worker: worker.into(),
            scope,
            start: window.start,
            end: window.end,
            reason: None,
        }
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }
}

/// One day of intents as handed over by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayPlan {
    pub day: NaiveDate,
    #[serde(default)]
    pub shifts: Vec<ShiftIntent>,
    #[serde(default)]
    pub gaps: Vec<GapIntent>,
}

impl DayPlan {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            shifts: Vec::new(),
            gaps: Vec::new(),
        }
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// An incremental change to the current day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum IntentDelta {
    AddShift { shift: ShiftIntent },
    RemoveShift { id: IntentId },
    AddGap { gap: GapIntent },
    RemoveGap { id: IntentId },
    SetSkill { shift_id: IntentId, skill: Skill, value: SkillLevel },
    SetModifier { shift_id: IntentId, modifier: f64 },
}

/// A validated intent, possibly split at midnight.
#[derive(Debug, Clone, PartialEq)]
pub enum Validated<T> {
    SameDay(T),
    Overnight { today: T, carry_over: Option<T> },
}

impl<T> Validated<T> {
    pub fn into_parts(self) -> (T, Option<T>) {
        match self {
            Self::SameDay(today) => (today, None),
            Self::Overnight { today, carry_over } => (today, carry_over),
        }
    }
}

/// Resolve a window against the overnight policy.
/// Returns today's window and, for overnight windows, the next-day remainder.
fn split_window(
    id: &str,
    start: ClockTime,
    end: ClockTime,
    policy: OvernightPolicy,
) -> RotaResult<(TimeWindow, Option<TimeWindow>)> {
    if start >= ClockTime::END_OF_DAY {
        return Err(RotaError::invalid_intent(id, format!("start {start} is not within the day")));
    }
    if end > start {
        return Ok((TimeWindow::new(start, end), None));
    }
    match policy {
        OvernightPolicy::Reject => Err(RotaError::invalid_intent(
            id,
            format!("end {end} is not after start {start}"),
        )),
        OvernightPolicy::SplitAtMidnight if end == start => Err(RotaError::invalid_intent(
            id,
            format!("zero-length window at {start}"),
        )),
        OvernightPolicy::SplitAtMidnight => {
            let today = TimeWindow::new(start, ClockTime::END_OF_DAY);
            let rest = TimeWindow::new(ClockTime::MIDNIGHT, end);
            Ok((today, (!rest.is_empty()).then_some(rest)))
        }
    }
}

pub fn validate_shift(shift: &ShiftIntent, config: &RotaConfig) -> RotaResult<Validated<ShiftIntent>> {
    if shift.worker.trim().is_empty() {
        return Err(RotaError::invalid_intent(&shift.id, "empty worker id"));
    }
    config.require_modality(&shift.modality)?;
    for skill in shift.rule_overrides.keys().chain(shift.manual_overrides.keys()) {
        config.require_skill(skill)?;
    }
    if !(MIN_MODIFIER..=MAX_MODIFIER).contains(&shift.modifier) {
        return Err(RotaError::invalid_intent(
            &shift.id,
            format!("modifier {} outside {MIN_MODIFIER}..={MAX_MODIFIER}", shift.modifier),
        ));
    }

    let (today, rest) = split_window(&shift.id, shift.start, shift.end, config.overnight_policy)?;
    let mut today_shift = shift.clone();
    today_shift.start = today.start;
    today_shift.end = today.end;
    if shift.end > shift.start {
        return Ok(Validated::SameDay(today_shift));
    }
    let carry_over = rest.map(|w| {
        let mut next = shift.clone();
        next.id = format!("{}+1", shift.id);
        next.start = w.start;
        next.end = w.end;
        next
    });
    log::debug!("Shift '{}' crosses midnight; split at 24:00", shift.id);
    Ok(Validated::Overnight {
        today: today_shift,
        carry_over,
    })
}

pub fn validate_gap(gap: &GapIntent, config: &RotaConfig) -> RotaResult<Validated<GapIntent>> {
    if gap.worker.trim().is_empty() {
        return Err(RotaError::invalid_intent(&gap.id, "empty worker id"));
    }
    if let GapScope::Modalities(set) = &gap.scope {
        if set.is_empty() {
            return Err(RotaError::invalid_intent(&gap.id, "gap scope lists no modality"));
        }
        for modality in set {
            config.require_modality(modality)?;
        }
    }

    let (today, rest) = split_window(&gap.id, gap.start, gap.end, config.overnight_policy)?;
    let mut today_gap = gap.clone();
    today_gap.start = today.start;
    today_gap.end = today.end;
    if gap.end > gap.start {
        return Ok(Validated::SameDay(today_gap));
    }
    let carry_over = rest.map(|w| {
        let mut next = gap.clone();
        next.id = format!("{}+1", gap.id);
        next.start = w.start;
        next.end = w.end;
        next
    });
    Ok(Validated::Overnight {
        today: today_gap,
        carry_over,
    })
}
