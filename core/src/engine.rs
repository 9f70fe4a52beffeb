//! The rota engine: owns config, roster, schedule, ledger and clock.
//!
//! RULES:
//!   - All state sits behind one mutex. Every public call takes it once.
//!   - Pool construction, ratio comparison, the pick and the ledger
//!     increment happen inside one critical section, so two concurrent
//!     requests can never both see the same stale minimum.
//!   - Schedule recomputation and ledger reset hold the same lock, so an
//!     assignment never runs against a half-updated schedule.
//!   - Only `load_day` and `reset_ledger` clear counters. Edits and roster
//!     reloads keep them.

use crate::{
    balancer::{AssignOutcome, AssignmentResult, Balancer, Selection},
    clock::DutyClock,
    config::RotaConfig,
    error::RotaResult,
    intent::{DayPlan, IntentDelta},
    ledger::{assignment_weight, WorkloadLedger, WorkloadRecord},
    normalizer::AvailabilitySegment,
    roster::Roster,
    schedule::DaySchedule,
    snapshot::RotaSnapshot,
    types::{ClockTime, IntentId, Skill, WorkerId},
};
use chrono::NaiveDate;
use parking_lot::Mutex;

struct RotaState {
    config: RotaConfig,
    roster: Roster,
    schedule: DaySchedule,
    ledger: WorkloadLedger,
    clock: DutyClock,
}

impl RotaState {
    /// Credit elapsed time of hour-counting segments to the ledger.
    fn advance_clock(&mut self, to: ClockTime) -> RotaResult<()> {
        let elapsed = self.clock.advance_to(to)?;
        if elapsed.is_empty() {
            return Ok(());
        }
        for segment in self.schedule.all_segments().filter(|s| s.counts_for_hours) {
            if let Some(overlap) = segment.window.intersect(&elapsed) {
                self.ledger
                    .accumulate_hours(&segment.worker, &segment.modality, overlap.hours());
            }
        }
        Ok(())
    }
}

pub struct Rota {
    state: Mutex<RotaState>,
}

impl Rota {
    /// Build an engine for one day. The clock starts at 00:00 with an empty ledger.
    pub fn new(config: RotaConfig, roster: Roster, plan: DayPlan) -> RotaResult<Self> {
        roster.validate(&config)?;
        let schedule = DaySchedule::build(plan, &config, &roster)?;
        let clock = DutyClock::new(schedule.day);
        Ok(Self {
            state: Mutex::new(RotaState {
                config,
                roster,
                schedule,
                ledger: WorkloadLedger::new(),
                clock,
            }),
        })
    }

    /// Test engine with `RotaConfig::default_test()`.
    pub fn build_test(roster: Roster, plan: DayPlan) -> RotaResult<Self> {
        Self::new(RotaConfig::default_test(), roster, plan)
    }

    /// Full reload: new day plan, ledger zeroed, clock back to 00:00.
    pub fn load_day(&self, plan: DayPlan) -> RotaResult<()> {
        let mut state = self.state.lock();
        let schedule = DaySchedule::build(plan, &state.config, &state.roster)?;
        state.clock = DutyClock::new(schedule.day);
        state.schedule = schedule;
        state.ledger.reset();
        log::info!("Day {} loaded; ledger reset", state.clock.day);
        Ok(())
    }

    /// Pick a worker for (modality, skill) at the current clock time and
    /// record the assignment.
    pub fn assign(&self, modality: &str, skill: &str, strict: bool) -> RotaResult<AssignOutcome> {
        let mut state = self.state.lock();
        let now = state.clock.now;
        let selection = Balancer::new(&state.config, &state.schedule, &state.ledger, now)
            .select(modality, skill, strict)?;

        let pick = match selection {
            Selection::Nobody { reason } => {
                log::info!("No available worker for {skill}/{modality}: {reason}");
                return Ok(AssignOutcome::NoAvailableWorker { reason });
            }
            Selection::Picked(pick) => pick,
        };

        let base_weight = state.config.base_weight(&pick.skill_used, modality)?;
        let global_modifier = state
            .roster
            .entry(&pick.candidate.worker)
            .map(|e| e.global_modifier)
            .unwrap_or(1.0)
            * pick.candidate.segment_modifier;
        let weight = assignment_weight(
            base_weight,
            global_modifier,
            pick.candidate.value,
            state.config.modifier_policy,
        );
        state
            .ledger
            .record_assignment(&pick.candidate.worker, &pick.skill_used, modality, weight);

        let result = AssignmentResult {
            worker: pick.candidate.worker,
            modality: modality.to_string(),
            skill_requested: skill.to_string(),
            skill_used: pick.skill_used,
            skill_value: pick.candidate.value,
            overflow: pick.overflow,
            fallback: pick.fallback,
            reason: pick.reason,
            weight,
            at: now,
        };
        log::info!(
            "Assigned {}/{} to {} (weight {:.3}{})",
            result.skill_used,
            result.modality,
            result.worker,
            result.weight,
            if result.overflow { ", overflow" } else { "" }
        );
        Ok(AssignOutcome::Assigned(result))
    }

    /// Segments for display. Empty when `day` is not the loaded day.
    pub fn get_segments(&self, day: NaiveDate, modality: &str) -> Vec<AvailabilitySegment> {
        let state = self.state.lock();
        if state.schedule.day != day {
            return Vec::new();
        }
        state.schedule.segments_for(modality)
    }

    /// Incremental edit. Recomputes only the touched worker; the ledger is kept.
    pub fn apply_edit(&self, delta: IntentDelta) -> RotaResult<WorkerId> {
        let mut state = self.state.lock();
        let RotaState {
            config,
            roster,
            schedule,
            ..
        } = &mut *state;
        schedule.apply_edit(delta, config, roster)
    }

    /// Swap in a new roster and rebuild the day from roster + rules.
    /// Returns manual values that did not survive. The ledger is kept.
    pub fn reload_roster(&self, roster: Roster) -> RotaResult<Vec<(IntentId, Skill)>> {
        let mut state = self.state.lock();
        roster.validate(&state.config)?;
        let mut schedule = state.schedule.clone();
        let dropped = schedule.reload(&state.config, &roster)?;
        state.schedule = schedule;
        state.roster = roster;
        log::info!("Roster reloaded; {} manual values dropped", dropped.len());
        Ok(dropped)
    }

    /// Zero every counter. Mutually exclusive with assignment in progress.
    pub fn reset_ledger(&self) {
        let mut state = self.state.lock();
        state.ledger.reset();
        log::info!("Ledger reset");
    }

    /// Move the clock forward, crediting hours worked since the last move.
    pub fn advance_clock(&self, to: ClockTime) -> RotaResult<()> {
        self.state.lock().advance_clock(to)
    }

    pub fn now(&self) -> ClockTime {
        self.state.lock().clock.now
    }

    pub fn day(&self) -> NaiveDate {
        self.state.lock().clock.day
    }

    pub fn ledger_record(&self, worker: &str, skill: &str, modality: &str) -> WorkloadRecord {
        self.state.lock().ledger.record(worker, skill, modality)
    }

    pub fn ledger(&self) -> WorkloadLedger {
        self.state.lock().ledger.clone()
    }

    pub fn schedule(&self) -> DaySchedule {
        self.state.lock().schedule.clone()
    }

    /// Consistent copy of {schedule, ledger, clock}.
    pub fn snapshot(&self) -> RotaSnapshot {
        let state = self.state.lock();
        RotaSnapshot::capture(&state.clock, &state.schedule, &state.ledger)
    }

    /// Rebuild an engine from a snapshot without recomputing segments.
    pub fn restore(config: RotaConfig, roster: Roster, snapshot: RotaSnapshot) -> RotaResult<Self> {
        roster.validate(&config)?;
        snapshot.schedule.check_invariants(&roster)?;
        log::info!("Restoring day {} at {}", snapshot.clock.day, snapshot.clock.now);
        Ok(Self {
            state: Mutex::new(RotaState {
                config,
                roster,
                schedule: snapshot.schedule,
                ledger: snapshot.ledger,
                clock: snapshot.clock,
            }),
        })
    }
}
