//! Segment normalization: disjointness, coverage and gap dominance.

use proptest::prelude::*;
use rota_core::{
    intent::{GapIntent, GapScope, ShiftIntent},
    normalizer::{is_disjoint, normalize_worker, ResolvedShift, SegmentSource},
    resolver::SkillMap,
    skill::SkillValue,
    types::{merge_windows, ClockTime, TimeWindow},
};
use std::collections::BTreeSet;

fn w(start: &str, end: &str) -> TimeWindow {
    TimeWindow::parse(start, end).unwrap()
}

fn skills() -> SkillMap {
    [
        ("cardiac".to_string(), SkillValue::Specialist),
        ("normal".to_string(), SkillValue::Generalist),
    ]
    .into()
}

fn window() -> impl Strategy<Value = TimeWindow> {
    (0u16..1380, 15u16..480).prop_map(|(start, len)| {
        TimeWindow::new(
            ClockTime::from_minutes(start).unwrap(),
            ClockTime::from_minutes((start + len).min(1440)).unwrap(),
        )
    })
}

proptest! {
    #[test]
    fn prop_segments_are_disjoint_and_cover_the_shifts(
        shift_windows in prop::collection::vec((window(), any::<bool>()), 1..5),
        gap_windows in prop::collection::vec(window(), 0..4),
    ) {
        let shifts: Vec<ShiftIntent> = shift_windows
            .iter()
            .enumerate()
            .map(|(i, (win, manual))| {
                let mut s = ShiftIntent::new(format!("s{i}"), "ana", "ct", *win);
                s.manual = *manual;
                s
            })
            .collect();
        let gaps: Vec<GapIntent> = gap_windows
            .iter()
            .enumerate()
            .map(|(i, win)| GapIntent::new(format!("g{i}"), "ana", GapScope::All, *win))
            .collect();
        let resolved: Vec<ResolvedShift> = shifts
            .iter()
            .map(|intent| ResolvedShift { intent, skills: skills() })
            .collect();
        let gap_refs: Vec<&GapIntent> = gaps.iter().collect();

        let out = normalize_worker("ana", &resolved, &gap_refs);
        let segments = &out["ct"];
        prop_assert!(is_disjoint(segments));

        let covered = merge_windows(segments.iter().map(|s| s.window).collect());
        let planned = merge_windows(shift_windows.iter().map(|(win, _)| *win).collect());
        prop_assert_eq!(covered, planned);

        for segment in segments {
            if segment.is_gap() {
                prop_assert!(segment.skills.values().all(|v| v.is_excluded()));
                prop_assert!(!segment.counts_for_hours);
            } else {
                prop_assert!(gap_windows.iter().all(|g| !segment.window.overlaps(g)));
            }
        }
    }
}

#[test]
fn manual_shift_claims_overlap() {
    let ingested = ShiftIntent::new("s1", "ana", "ct", w("08:00", "16:00")).with_modifier(1.0);
    let edited = ShiftIntent::new("s2", "ana", "ct", w("12:00", "18:00"))
        .with_modifier(0.5)
        .with_manual("cardiac", rota_core::skill::SkillLevel::Specialist);
    let resolved = vec![
        ResolvedShift { intent: &ingested, skills: skills() },
        ResolvedShift { intent: &edited, skills: skills() },
    ];

    let out = normalize_worker("ana", &resolved, &[]);
    let segs = &out["ct"];
    assert_eq!(segs.len(), 2);
    assert_eq!(segs[0].window, w("08:00", "12:00"));
    assert_eq!(segs[0].source, SegmentSource::Shift("s1".into()));
    assert_eq!(segs[1].window, w("12:00", "18:00"));
    assert_eq!(segs[1].modifier, 0.5);
    assert!(segs[1].manual);
}

#[test]
fn gap_scope_limits_affected_modalities() {
    let ct = ShiftIntent::new("s1", "ana", "ct", w("08:00", "12:00"));
    let mr = ShiftIntent::new("s2", "ana", "mr", w("08:00", "12:00"));
    let gap = GapIntent::new(
        "g1",
        "ana",
        GapScope::Modalities(BTreeSet::from(["mr".to_string()])),
        w("09:00", "10:00"),
    );
    let resolved = vec![
        ResolvedShift { intent: &ct, skills: skills() },
        ResolvedShift { intent: &mr, skills: skills() },
    ];

    let out = normalize_worker("ana", &resolved, &[&gap]);
    assert_eq!(out["ct"].len(), 1);
    let mr_windows: Vec<_> = out["mr"].iter().map(|s| (s.window, s.is_gap())).collect();
    assert_eq!(
        mr_windows,
        vec![
            (w("08:00", "09:00"), false),
            (w("09:00", "10:00"), true),
            (w("10:00", "12:00"), false),
        ]
    );
}

#[test]
fn gap_outside_shift_coverage_adds_nothing() {
    let shift = ShiftIntent::new("s1", "ana", "ct", w("08:00", "12:00"));
    let gap = GapIntent::new("g1", "ana", GapScope::All, w("11:00", "14:00"));
    let resolved = vec![ResolvedShift { intent: &shift, skills: skills() }];

    let out = normalize_worker("ana", &resolved, &[&gap]);
    let windows: Vec<_> = out["ct"].iter().map(|s| s.window).collect();
    assert_eq!(windows, vec![w("08:00", "11:00"), w("11:00", "12:00")]);
    assert_eq!(out["ct"][1].source, SegmentSource::Gap("g1".into()));
}

#[test]
fn adjacent_shifts_are_not_merged() {
    let a = ShiftIntent::new("s1", "ana", "ct", w("08:00", "12:00"));
    let b = ShiftIntent::new("s2", "ana", "ct", w("12:00", "16:00"));
    let resolved = vec![
        ResolvedShift { intent: &a, skills: skills() },
        ResolvedShift { intent: &b, skills: skills() },
    ];
    let out = normalize_worker("ana", &resolved, &[]);
    assert_eq!(out["ct"].len(), 2);
}

#[test]
fn other_workers_are_ignored() {
    let theirs = ShiftIntent::new("s1", "ben", "ct", w("08:00", "12:00"));
    let resolved = vec![ResolvedShift { intent: &theirs, skills: skills() }];
    assert!(normalize_worker("ana", &resolved, &[]).is_empty());
}
