//! Selection engine.
//!
//! Picks one worker for a (modality, skill) request. Pure with respect to
//! the ledger: it only reads counters. The engine records the assignment
//! inside the same critical section.
//!
//! ORDER OF DECISIONS:
//!   1. Pool: active in modality now, resolved value not Excluded.
//!   2. Exclusion rules (skipped on the no-exclusion fallback pass).
//!   3. Partition: Specialist/Weighted vs Generalist.
//!   4. Phase 1: any specialist under the minimum → underfilled specialists only.
//!   5. Phase 2: strict / no-overflow → specialists; else compare pool minimums.
//!   6. Overflow to the lowest-ratio generalist when imbalance ≥ threshold.
//!   7. Ties break on worker id.
//!   8. Empty pool caused only by exclusion rules → retry without them (non-strict).
//!   9. Still nobody → configured fallback skills (non-strict), then NoAvailableWorker.

use crate::{
    config::RotaConfig,
    error::RotaResult,
    ledger::WorkloadLedger,
    normalizer::AvailabilitySegment,
    schedule::DaySchedule,
    skill::SkillValue,
    types::{ClockTime, Modality, Skill, WorkerId},
};
use serde::{Deserialize, Serialize};

/// One worker eligible for the current request.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub worker:           WorkerId,
    pub value:            SkillValue,
    pub segment_modifier: f64,
    pub weighted_count:   f64,
    pub ratio:            f64,
    /// Inside the shift-start or shift-end buffer: not eligible for overflow.
    pub in_buffer:        bool,
}

#[derive(Debug, Clone, Default)]
pub struct Pools {
    pub specialists: Vec<Candidate>,
    pub generalists: Vec<Candidate>,
    /// Candidates removed only because of exclusion rules.
    pub excluded_by_rules: usize,
}

impl Pools {
    pub fn is_empty(&self) -> bool {
        self.specialists.is_empty() && self.generalists.is_empty()
    }
}

/// Why the pick deviated from a plain specialist pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Exclusion rules emptied the pool; picked with rules disabled.
    ExclusionRulesIgnored,
    /// Nobody could take the requested skill; a configured fallback skill was used.
    FallbackSkill,
    /// No specialist on duty; a generalist took the work.
    NoSpecialist,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pick {
    pub candidate: Candidate,
    pub skill_used: Skill,
    pub overflow: bool,
    pub fallback: Option<Fallback>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Picked(Pick),
    Nobody { reason: String },
}

/// Overflow signal in percent: how far the specialist minimum ratio sits
/// above the generalist minimum, relative to the larger of the two.
///
/// `(specialist - generalist) / specialist × 100` when the specialist
/// minimum is higher, else 0. An infinite specialist minimum against a
/// finite generalist minimum is 100%.
pub fn imbalance_pct(specialist_min: f64, generalist_min: f64) -> f64 {
    if !(specialist_min > generalist_min) {
        return 0.0;
    }
    if specialist_min.is_infinite() {
        return 100.0;
    }
    (specialist_min - generalist_min) / specialist_min * 100.0
}

/// Lowest ratio wins; equal ratios fall back to worker id order.
fn lowest<'c>(candidates: impl IntoIterator<Item = &'c Candidate>) -> Option<&'c Candidate> {
    candidates
        .into_iter()
        .min_by(|a, b| a.ratio.total_cmp(&b.ratio).then_with(|| a.worker.cmp(&b.worker)))
}

pub struct Balancer<'a> {
    config: &'a RotaConfig,
    schedule: &'a DaySchedule,
    ledger: &'a WorkloadLedger,
    now: ClockTime,
}

impl<'a> Balancer<'a> {
    pub fn new(
        config: &'a RotaConfig,
        schedule: &'a DaySchedule,
        ledger: &'a WorkloadLedger,
        now: ClockTime,
    ) -> Self {
        Self {
            config,
            schedule,
            ledger,
            now,
        }
    }

    /// Choose a worker for the request. Does not mutate anything.
    pub fn select(&self, modality: &str, skill: &str, strict: bool) -> RotaResult<Selection> {
        let skill_cfg = self.config.require_skill(skill)?;
        self.config.require_modality(modality)?;
        let strict = strict || skill_cfg.strict;

        if let Some(pick) = self.select_for_skill(modality, skill, strict)? {
            return Ok(Selection::Picked(pick));
        }
        if !strict {
            for fallback_skill in &skill_cfg.fallback {
                if let Some(mut pick) = self.select_for_skill(modality, fallback_skill, false)? {
                    log::warn!("No worker for {skill}/{modality}; falling back to skill '{fallback_skill}'");
                    pick.fallback = Some(Fallback::FallbackSkill);
                    pick.reason = Some(match pick.reason.take() {
                        Some(inner) => format!("no worker for '{skill}', used '{fallback_skill}' ({inner})"),
                        None => format!("no worker for '{skill}', used '{fallback_skill}'"),
                    });
                    return Ok(Selection::Picked(pick));
                }
            }
        }
        Ok(Selection::Nobody {
            reason: format!(
                "no eligible worker for {skill}/{modality} at {}{}",
                self.now,
                if strict { " (strict)" } else { "" }
            ),
        })
    }

    fn select_for_skill(&self, modality: &str, skill: &str, strict: bool) -> RotaResult<Option<Pick>> {
        let mut pools = self.build_pools(modality, skill, true);
        let mut fallback = None;
        if pools.is_empty() && !strict && pools.excluded_by_rules > 0 {
            log::warn!(
                "Exclusion rules removed all {} candidates for {skill}/{modality}; retrying without rules",
                pools.excluded_by_rules
            );
            pools = self.build_pools(modality, skill, false);
            fallback = Some(Fallback::ExclusionRulesIgnored);
        }
        if pools.is_empty() {
            return Ok(None);
        }
        let overflow_allowed = self.config.overflow_allowed(skill, modality)?;
        let Some(mut pick) = self.choose(&pools, skill, strict, overflow_allowed) else {
            return Ok(None);
        };
        if let Some(fb) = fallback {
            pick.fallback = Some(fb);
            let note = "exclusion rules left no candidate; rules ignored";
            pick.reason = Some(match pick.reason.take() {
                Some(inner) => format!("{note} ({inner})"),
                None => note.to_string(),
            });
        }
        Ok(Some(pick))
    }

    /// Steps 1-3: eligible workers, partitioned by resolved value.
    pub fn build_pools(&self, modality: &str, skill: &str, apply_exclusions: bool) -> Pools {
        let mut pools = Pools::default();
        for segment in self.schedule.active_in(modality, self.now) {
            let value = segment.skill(skill);
            if value.is_excluded() {
                continue;
            }
            if apply_exclusions && self.excluded_by_rules(&segment.worker, skill, modality) {
                pools.excluded_by_rules += 1;
                continue;
            }
            let record = self.ledger.record(&segment.worker, skill, modality);
            let candidate = Candidate {
                worker: segment.worker.clone(),
                value,
                segment_modifier: segment.modifier,
                weighted_count: record.weighted_count,
                ratio: record.ratio(),
                in_buffer: self.in_buffer(segment),
            };
            if value.is_specialist() {
                pools.specialists.push(candidate);
            } else {
                pools.generalists.push(candidate);
            }
        }
        log::debug!(
            "Pools for {skill}/{modality} at {}: {} specialists, {} generalists, {} excluded by rules",
            self.now,
            pools.specialists.len(),
            pools.generalists.len(),
            pools.excluded_by_rules
        );
        pools
    }

    /// A worker is excluded when they actively hold any target skill of the rule.
    fn excluded_by_rules(&self, worker: &str, skill: &str, modality: &str) -> bool {
        let Some(targets) = self.config.exclusions.targets(skill, modality) else {
            return false;
        };
        targets.iter().any(|target| {
            self.schedule
                .active_segment(worker, &target.modality, self.now)
                .is_some_and(|seg| seg.skill(&target.skill).is_specialist())
        })
    }

    fn in_buffer(&self, segment: &AvailabilitySegment) -> bool {
        let cfg = &self.config.balancer;
        let shift = segment.shift_window;
        self.now < shift.start.plus_minutes(cfg.shift_start_buffer_minutes)
            || self.now >= shift.end.minus_minutes(cfg.shift_end_buffer_minutes)
    }

    /// Steps 4-7.
    fn choose(&self, pools: &Pools, skill: &str, strict: bool, overflow_allowed: bool) -> Option<Pick> {
        let min_required = self.config.balancer.min_assignments_per_skill;
        let specialist_pick = |candidate: &Candidate| Pick {
            candidate: candidate.clone(),
            skill_used: skill.to_string(),
            overflow: false,
            fallback: None,
            reason: None,
        };

        // Phase 1: minimum fairness. Generalists wait until every specialist has the minimum.
        let underfilled: Vec<&Candidate> = pools
            .specialists
            .iter()
            .filter(|c| c.weighted_count < min_required)
            .collect();
        if !underfilled.is_empty() {
            return lowest(underfilled).map(specialist_pick);
        }

        if pools.specialists.is_empty() {
            if strict || !overflow_allowed {
                return None;
            }
            let overflow_eligible: Vec<&Candidate> = pools.generalists.iter().filter(|c| !c.in_buffer).collect();
            let chosen = lowest(overflow_eligible).or_else(|| lowest(&pools.generalists))?;
            return Some(Pick {
                candidate: chosen.clone(),
                skill_used: skill.to_string(),
                overflow: true,
                fallback: Some(Fallback::NoSpecialist),
                reason: Some("no specialist on duty".into()),
            });
        }

        // Phase 2: normal mode.
        let best_specialist = lowest(&pools.specialists)?;
        if strict || !overflow_allowed {
            return Some(specialist_pick(best_specialist));
        }
        let overflow_eligible: Vec<&Candidate> = pools.generalists.iter().filter(|c| !c.in_buffer).collect();
        let Some(best_generalist) = lowest(overflow_eligible) else {
            return Some(specialist_pick(best_specialist));
        };
        let imbalance = imbalance_pct(best_specialist.ratio, best_generalist.ratio);
        if imbalance >= self.config.balancer.imbalance_threshold_pct {
            log::debug!(
                "Overflow for {skill}: specialist min {:.3} vs generalist min {:.3} ({imbalance:.1}%)",
                best_specialist.ratio,
                best_generalist.ratio
            );
            return Some(Pick {
                candidate: best_generalist.clone(),
                skill_used: skill.to_string(),
                overflow: true,
                fallback: None,
                reason: Some(format!("overflow: specialists {imbalance:.1}% more loaded")),
            });
        }
        Some(specialist_pick(best_specialist))
    }
}

/// Outcome of one assignment request as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub worker: WorkerId,
    pub modality: Modality,
    pub skill_requested: Skill,
    pub skill_used: Skill,
    pub skill_value: SkillValue,
    pub overflow: bool,
    pub fallback: Option<Fallback>,
    pub reason: Option<String>,
    pub weight: f64,
    pub at: ClockTime,
}

/// `NoAvailableWorker` is an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignOutcome {
    Assigned(AssignmentResult),
    NoAvailableWorker { reason: String },
}

impl AssignOutcome {
    pub fn assigned(&self) -> Option<&AssignmentResult> {
        match self {
            Self::Assigned(result) => Some(result),
            Self::NoAvailableWorker { .. } => None,
        }
    }

    pub fn worker(&self) -> Option<&str> {
        self.assigned().map(|r| r.worker.as_str())
    }
}
