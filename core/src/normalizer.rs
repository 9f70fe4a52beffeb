//! Segment normalization.
//!
//! Turns one worker's shift and gap intents for a day into ordered,
//! non-overlapping availability segments per modality.
//!
//! RULES:
//!   - Gaps always win over shifts in overlapping time.
//!   - Where shifts overlap each other, manual shifts win, then the earlier start,
//!     then input order.
//!   - A gap yields its own segment with every skill Excluded, clipped to the
//!     planned shift coverage of that modality.
//!   - Nothing is merged: adjacent segments from different intents stay separate.

use crate::{
    intent::{GapIntent, ShiftIntent},
    resolver::SkillMap,
    skill::SkillValue,
    types::{merge_windows, IntentId, Modality, TimeWindow, WorkerId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a segment came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "intent", rename_all = "snake_case")]
pub enum SegmentSource {
    Shift(IntentId),
    Gap(IntentId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySegment {
    pub worker:           WorkerId,
    pub modality:         Modality,
    pub window:           TimeWindow,
    /// Planned window of the originating shift; shift-start/end buffers use it.
    pub shift_window:     TimeWindow,
    pub source:           SegmentSource,
    pub skills:           SkillMap,
    pub modifier:         f64,
    pub counts_for_hours: bool,
    pub manual:           bool,
}

impl AvailabilitySegment {
    /// Resolved value for `skill`; skills missing from the snapshot are excluded.
    pub fn skill(&self, skill: &str) -> SkillValue {
        self.skills.get(skill).copied().unwrap_or(SkillValue::Excluded)
    }

    pub fn is_gap(&self) -> bool {
        matches!(self.source, SegmentSource::Gap(_))
    }
}

/// A shift paired with its resolved skill map.
#[derive(Debug, Clone)]
pub struct ResolvedShift<'a> {
    pub intent: &'a ShiftIntent,
    pub skills: SkillMap,
}

/// Normalize one worker's day. Shifts and gaps for other workers are ignored.
pub fn normalize_worker(
    worker: &str,
    shifts: &[ResolvedShift<'_>],
    gaps: &[&GapIntent],
) -> BTreeMap<Modality, Vec<AvailabilitySegment>> {
    let mut by_modality: BTreeMap<&str, Vec<&ResolvedShift<'_>>> = BTreeMap::new();
    for shift in shifts.iter().filter(|s| s.intent.worker == worker) {
        by_modality.entry(shift.intent.modality.as_str()).or_default().push(shift);
    }

    by_modality
        .into_iter()
        .map(|(modality, mut shifts)| {
            // Stable sort keeps input order as the last tie-break.
            shifts.sort_by(|a, b| {
                b.intent
                    .manual
                    .cmp(&a.intent.manual)
                    .then(a.intent.start.cmp(&b.intent.start))
            });
            let modality_gaps: Vec<&GapIntent> = gaps
                .iter()
                .copied()
                .filter(|g| g.worker == worker && g.scope.applies_to(modality))
                .collect();
            let segments = normalize_modality(worker, modality, &shifts, &modality_gaps);
            (modality.to_string(), segments)
        })
        .collect()
}

fn normalize_modality(
    worker: &str,
    modality: &str,
    shifts: &[&ResolvedShift<'_>],
    gaps: &[&GapIntent],
) -> Vec<AvailabilitySegment> {
    let gap_windows = merge_windows(gaps.iter().map(|g| g.window()).collect());
    let mut claimed: Vec<TimeWindow> = Vec::new();
    let mut segments = Vec::new();

    // Shift-derived pieces: shift window minus earlier claims minus gaps.
    for shift in shifts {
        let pieces = shift.intent.window().subtract_all(&claimed);
        claimed.extend(pieces.iter().copied());
        for piece in pieces {
            for window in piece.subtract_all(&gap_windows) {
                segments.push(AvailabilitySegment {
                    worker: worker.to_string(),
                    modality: modality.to_string(),
                    window,
                    shift_window: shift.intent.planned_window(),
                    source: SegmentSource::Shift(shift.intent.id.clone()),
                    skills: shift.skills.clone(),
                    modifier: shift.intent.modifier,
                    counts_for_hours: shift.intent.counts_for_hours,
                    manual: shift.intent.manual,
                });
            }
        }
    }

    // Gap pieces, clipped to planned coverage; earlier gaps claim overlaps first.
    let mut sorted_gaps: Vec<&GapIntent> = gaps.to_vec();
    sorted_gaps.sort_by_key(|g| g.start);
    let mut gap_claimed: Vec<TimeWindow> = Vec::new();
    let mut covered: Vec<(TimeWindow, &ResolvedShift<'_>)> = Vec::new();
    for shift in shifts {
        let planned = shift.intent.planned_window();
        let claimed_by_earlier: Vec<TimeWindow> = covered.iter().map(|(w, _)| *w).collect();
        for piece in planned.subtract_all(&claimed_by_earlier) {
            covered.push((piece, *shift));
        }
    }
    for gap in sorted_gaps {
        for (coverage, shift) in &covered {
            let Some(overlap) = gap.window().intersect(coverage) else {
                continue;
            };
            for window in overlap.subtract_all(&gap_claimed) {
                segments.push(AvailabilitySegment {
                    worker: worker.to_string(),
                    modality: modality.to_string(),
                    window,
                    shift_window: shift.intent.planned_window(),
                    source: SegmentSource::Gap(gap.id.clone()),
                    skills: shift
                        .skills
                        .keys()
                        .map(|skill| (skill.clone(), SkillValue::Excluded))
                        .collect(),
                    modifier: 1.0,
                    counts_for_hours: false,
                    manual: false,
                });
                gap_claimed.push(window);
            }
        }
    }

    segments.sort_by_key(|s| s.window);
    debug_assert!(is_disjoint(&segments), "normalized segments overlap for {worker}/{modality}");
    segments
}

/// Segments are ordered and pairwise time-disjoint.
pub fn is_disjoint(segments: &[AvailabilitySegment]) -> bool {
    segments.windows(2).all(|pair| pair[0].window.end <= pair[1].window.start)
}
