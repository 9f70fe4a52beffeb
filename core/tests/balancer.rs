//! Selection: minimum fairness, overflow, strict mode, buffers, exclusion rules.

use chrono::NaiveDate;
use proptest::prelude::*;
use rota_core::{
    balancer::{imbalance_pct, Balancer, Fallback, Pick, Selection},
    config::RotaConfig,
    intent::{DayPlan, GapIntent, GapScope, ShiftIntent},
    ledger::WorkloadLedger,
    roster::{Roster, RosterEntry},
    schedule::DaySchedule,
    skill::SkillLevel,
    types::{ClockTime, TimeWindow},
    ErrorKind,
};
use std::collections::BTreeMap;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn at(s: &str) -> ClockTime {
    s.parse().unwrap()
}

fn shift(id: &str, worker: &str, start: &str, end: &str) -> ShiftIntent {
    ShiftIntent::new(id, worker, "ct", TimeWindow::parse(start, end).unwrap())
}

/// ana and cleo are cardiac specialists on CT; ben is a generalist.
fn roster() -> Roster {
    Roster::new([
        RosterEntry::new("ana").with_skill("cardiac", "ct", SkillLevel::Specialist),
        RosterEntry::new("ben"),
        RosterEntry::new("cleo").with_skill("cardiac", "ct", SkillLevel::Specialist),
    ])
}

fn schedule(config: &RotaConfig, roster: &Roster, shifts: Vec<ShiftIntent>, gaps: Vec<GapIntent>) -> DaySchedule {
    let mut plan = DayPlan::new(day());
    plan.shifts = shifts;
    plan.gaps = gaps;
    DaySchedule::build(plan, config, roster).expect("schedule builds")
}

fn day_shifts(workers: &[&str]) -> Vec<ShiftIntent> {
    workers
        .iter()
        .enumerate()
        .map(|(i, w)| shift(&format!("s{i}"), w, "08:00", "16:00"))
        .collect()
}

/// Cardiac/CT counters: (worker, weighted count, hours).
fn ledger(rows: &[(&str, f64, f64)]) -> WorkloadLedger {
    let mut ledger = WorkloadLedger::new();
    for (worker, count, hours) in rows {
        ledger.accumulate_hours(worker, "ct", *hours);
        if *count > 0.0 {
            ledger.record_assignment(worker, "cardiac", "ct", *count);
        }
    }
    ledger
}

fn picked(selection: Selection) -> Pick {
    match selection {
        Selection::Picked(pick) => pick,
        Selection::Nobody { reason } => panic!("expected a pick, got nobody: {reason}"),
    }
}

proptest! {
    #[test]
    fn prop_imbalance_is_a_bounded_percentage(spec in 0.0f64..1000.0, generalist in 0.0f64..1000.0) {
        let pct = imbalance_pct(spec, generalist);
        prop_assert!((0.0..=100.0).contains(&pct));
        if spec <= generalist {
            prop_assert_eq!(pct, 0.0);
        }
        prop_assert_eq!(imbalance_pct(f64::INFINITY, generalist), 100.0);
    }
}

#[test]
fn overflow_triggers_at_fifty_percent_but_not_twenty() {
    let config = RotaConfig::default_test();
    let roster = roster();
    let schedule = schedule(&config, &roster, day_shifts(&["ana", "ben"]), vec![]);

    // Specialist min 10 vs generalist min 5: 50% ≥ 30%.
    let l = ledger(&[("ana", 20.0, 2.0), ("ben", 10.0, 2.0)]);
    let pick = picked(Balancer::new(&config, &schedule, &l, at("10:00")).select("ct", "cardiac", false).unwrap());
    assert_eq!(pick.candidate.worker, "ben");
    assert!(pick.overflow);
    assert_eq!(pick.fallback, None);

    // Generalist min 8: only 20% below.
    let l = ledger(&[("ana", 20.0, 2.0), ("ben", 16.0, 2.0)]);
    let pick = picked(Balancer::new(&config, &schedule, &l, at("10:00")).select("ct", "cardiac", false).unwrap());
    assert_eq!(pick.candidate.worker, "ana");
    assert!(!pick.overflow);
}

#[test]
fn phase_one_never_picks_a_generalist() {
    let mut config = RotaConfig::default_test();
    config.balancer.min_assignments_per_skill = 2.0;
    let roster = roster();
    let schedule = schedule(&config, &roster, day_shifts(&["ana", "ben"]), vec![]);

    // ana already has one assignment and no hours: infinite ratio, yet still under the minimum.
    let l = ledger(&[("ana", 1.0, 0.0)]);
    let pick = picked(Balancer::new(&config, &schedule, &l, at("08:30")).select("ct", "cardiac", false).unwrap());
    assert_eq!(pick.candidate.worker, "ana");
    assert!(!pick.overflow);
}

#[test]
fn lowest_ratio_specialist_wins() {
    let config = RotaConfig::default_test();
    let roster = roster();
    let schedule = schedule(&config, &roster, day_shifts(&["ana", "cleo"]), vec![]);

    let l = ledger(&[("ana", 4.0, 2.0), ("cleo", 2.0, 2.0)]);
    let pick = picked(Balancer::new(&config, &schedule, &l, at("10:00")).select("ct", "cardiac", false).unwrap());
    assert_eq!(pick.candidate.worker, "cleo");
    assert_eq!(pick.candidate.ratio, 1.0);
}

#[test]
fn equal_ratios_break_on_worker_id() {
    let config = RotaConfig::default_test();
    let roster = roster();
    let schedule = schedule(&config, &roster, day_shifts(&["cleo", "ana"]), vec![]);
    let l = WorkloadLedger::new();

    for _ in 0..3 {
        let pick = picked(Balancer::new(&config, &schedule, &l, at("09:00")).select("ct", "cardiac", false).unwrap());
        assert_eq!(pick.candidate.worker, "ana");
    }
}

#[test]
fn strict_request_never_falls_back_to_generalists() {
    let config = RotaConfig::default_test();
    let roster = roster();
    let schedule = schedule(&config, &roster, day_shifts(&["ben"]), vec![]);
    let l = WorkloadLedger::new();
    let balancer = Balancer::new(&config, &schedule, &l, at("09:00"));

    assert!(matches!(balancer.select("ct", "cardiac", true).unwrap(), Selection::Nobody { .. }));

    let pick = picked(balancer.select("ct", "cardiac", false).unwrap());
    assert_eq!(pick.candidate.worker, "ben");
    assert!(pick.overflow);
    assert_eq!(pick.fallback, Some(Fallback::NoSpecialist));
}

#[test]
fn strict_skill_flag_forces_strict_mode() {
    let mut config = RotaConfig::default_test();
    config.skills.iter_mut().find(|s| s.slug == "cardiac").unwrap().strict = true;
    let roster = roster();
    let schedule = schedule(&config, &roster, day_shifts(&["ben"]), vec![]);
    let l = WorkloadLedger::new();

    let selection = Balancer::new(&config, &schedule, &l, at("09:00")).select("ct", "cardiac", false).unwrap();
    assert!(matches!(selection, Selection::Nobody { .. }));
}

#[test]
fn no_overflow_modality_keeps_work_with_specialists() {
    let mut config = RotaConfig::default_test();
    config.modalities.iter_mut().find(|m| m.slug == "ct").unwrap().no_overflow = vec!["cardiac".into()];
    let roster = roster();
    let schedule = schedule(&config, &roster, day_shifts(&["ana", "ben"]), vec![]);

    let l = ledger(&[("ana", 20.0, 2.0), ("ben", 10.0, 2.0)]);
    let pick = picked(Balancer::new(&config, &schedule, &l, at("10:00")).select("ct", "cardiac", false).unwrap());
    assert_eq!(pick.candidate.worker, "ana");
    assert!(!pick.overflow);
}

#[test]
fn no_overflow_skill_without_specialists_is_unfilled() {
    let mut config = RotaConfig::default_test();
    config.skills.iter_mut().find(|s| s.slug == "cardiac").unwrap().no_overflow = true;
    let roster = roster();
    let schedule = schedule(&config, &roster, day_shifts(&["ben"]), vec![]);
    let l = WorkloadLedger::new();

    let selection = Balancer::new(&config, &schedule, &l, at("10:00")).select("ct", "cardiac", false).unwrap();
    assert!(matches!(selection, Selection::Nobody { .. }), "got {selection:?}");

    config.skills.iter_mut().find(|s| s.slug == "cardiac").unwrap().no_overflow = false;
    let pick = picked(Balancer::new(&config, &schedule, &l, at("10:00")).select("ct", "cardiac", false).unwrap());
    assert_eq!(pick.candidate.worker, "ben");
    assert_eq!(pick.fallback, Some(Fallback::NoSpecialist));
}

#[test]
fn generalists_in_shift_buffers_are_not_overflow_targets() {
    let mut config = RotaConfig::default_test();
    config.balancer.shift_start_buffer_minutes = 30;
    config.balancer.shift_end_buffer_minutes = 30;
    let roster = roster();
    let schedule = schedule(&config, &roster, day_shifts(&["ana", "ben"]), vec![]);
    let l = ledger(&[("ana", 20.0, 2.0), ("ben", 10.0, 2.0)]);

    let early = picked(Balancer::new(&config, &schedule, &l, at("08:10")).select("ct", "cardiac", false).unwrap());
    assert_eq!(early.candidate.worker, "ana");

    let mid = picked(Balancer::new(&config, &schedule, &l, at("12:00")).select("ct", "cardiac", false).unwrap());
    assert_eq!(mid.candidate.worker, "ben");
    assert!(mid.overflow);

    let late = picked(Balancer::new(&config, &schedule, &l, at("15:45")).select("ct", "cardiac", false).unwrap());
    assert_eq!(late.candidate.worker, "ana");
}

#[test]
fn worker_in_a_gap_is_not_a_candidate() {
    let config = RotaConfig::default_test();
    let roster = roster();
    let gap = GapIntent::new("g1", "ana", GapScope::All, TimeWindow::parse("10:00", "11:00").unwrap());
    let schedule = schedule(&config, &roster, day_shifts(&["ana", "cleo"]), vec![gap]);
    let l = WorkloadLedger::new();

    let during = picked(Balancer::new(&config, &schedule, &l, at("10:30")).select("ct", "cardiac", false).unwrap());
    assert_eq!(during.candidate.worker, "cleo");
    let after = picked(Balancer::new(&config, &schedule, &l, at("11:00")).select("ct", "cardiac", false).unwrap());
    assert_eq!(after.candidate.worker, "ana");
}

#[test]
fn exclusion_rules_skip_workers_holding_the_target_skill() {
    let config = RotaConfig::default_test()
        .with_exclusion_rules(&BTreeMap::from([("cardiac_ct".to_string(), vec!["msk".to_string()])]))
        .unwrap();
    let roster = Roster::new([
        RosterEntry::new("ana")
            .with_skill("cardiac", "ct", SkillLevel::Specialist)
            .with_skill("msk", "ct", SkillLevel::Specialist),
        RosterEntry::new("cleo").with_skill("cardiac", "ct", SkillLevel::Specialist),
    ]);
    let l = WorkloadLedger::new();

    let both = schedule(&config, &roster, day_shifts(&["ana", "cleo"]), vec![]);
    let pick = picked(Balancer::new(&config, &both, &l, at("09:00")).select("ct", "cardiac", false).unwrap());
    assert_eq!(pick.candidate.worker, "cleo");
    assert_eq!(pick.fallback, None);

    // Only ana on duty: rules empty the pool, so a non-strict request ignores them.
    let alone = schedule(&config, &roster, day_shifts(&["ana"]), vec![]);
    let balancer = Balancer::new(&config, &alone, &l, at("09:00"));
    let pick = picked(balancer.select("ct", "cardiac", false).unwrap());
    assert_eq!(pick.candidate.worker, "ana");
    assert_eq!(pick.fallback, Some(Fallback::ExclusionRulesIgnored));
    assert!(pick.reason.is_some());

    assert!(matches!(balancer.select("ct", "cardiac", true).unwrap(), Selection::Nobody { .. }));
}

#[test]
fn fallback_skill_is_used_when_nobody_fits() {
    let mut config = RotaConfig::default_test();
    config.skills.iter_mut().find(|s| s.slug == "notfall").unwrap().fallback = vec!["normal".into()];
    let roster = Roster::new([RosterEntry::new("ana").with_skill("notfall", "ct", SkillLevel::Excluded)]);
    let schedule = schedule(&config, &roster, day_shifts(&["ana"]), vec![]);
    let l = WorkloadLedger::new();

    let pick = picked(Balancer::new(&config, &schedule, &l, at("09:00")).select("ct", "notfall", false).unwrap());
    assert_eq!(pick.candidate.worker, "ana");
    assert_eq!(pick.skill_used, "normal");
    assert_eq!(pick.fallback, Some(Fallback::FallbackSkill));
}

#[test]
fn nobody_on_duty_is_an_outcome_unknown_slug_is_an_error() {
    let config = RotaConfig::default_test();
    let roster = roster();
    let schedule = schedule(&config, &roster, day_shifts(&["ana"]), vec![]);
    let l = WorkloadLedger::new();
    let balancer = Balancer::new(&config, &schedule, &l, at("20:00"));

    assert!(matches!(balancer.select("ct", "cardiac", false).unwrap(), Selection::Nobody { .. }));

    let err = balancer.select("ct", "neuro", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    let err = balancer.select("pet", "cardiac", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
