//! Seeded request replay.
//!
//! RULE: All randomness comes from one Pcg64Mcg seeded from `--seed`,
//! so the same seed, config and day always produce the same assignments.

use anyhow::Result;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use rota_core::{
    balancer::AssignOutcome,
    config::RotaConfig,
    engine::Rota,
    types::WorkerId,
};
use std::collections::BTreeMap;

/// Chance that a generated request is strict.
const STRICT_SHARE: f64 = 0.1;

struct RequestRng {
    inner: Pcg64Mcg,
}

impl RequestRng {
    fn new(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Index in [0, n). `n` must be non-zero.
    fn below(&mut self, n: usize) -> usize {
        (self.inner.next_u64() % n as u64) as usize
    }
}

#[derive(Debug, Default)]
pub struct SimReport {
    pub requests: usize,
    pub assigned: usize,
    pub overflow: usize,
    pub fallback: usize,
    pub unfilled: usize,
    pub per_worker: BTreeMap<WorkerId, usize>,
}

/// Spread `requests` evenly over the staffed part of the day and feed them
/// to the engine, advancing the clock between requests.
pub fn run(rota: &Rota, config: &RotaConfig, seed: u64, requests: usize) -> Result<SimReport> {
    let mut report = SimReport::default();
    let schedule = rota.schedule();
    let Some(first) = schedule.shifts().iter().map(|s| s.start).min() else {
        log::warn!("Day {} has no shifts; nothing to simulate", schedule.day);
        return Ok(report);
    };
    let last = schedule.shifts().iter().map(|s| s.end).max().unwrap_or(first);
    if config.modalities.is_empty() || config.skills.is_empty() || requests == 0 {
        return Ok(report);
    }

    let mut rng = RequestRng::new(seed);
    let start = first.max(rota.now());
    let span = last.minutes().saturating_sub(start.minutes()) as usize;

    for i in 0..requests {
        let offset = (span * i / requests) as u16;
        let at = start.plus_minutes(offset);
        if at > rota.now() {
            rota.advance_clock(at)?;
        }

        let modality = &config.modalities[rng.below(config.modalities.len())].slug;
        let skill = &config.skills[rng.below(config.skills.len())].slug;
        let strict = rng.chance(STRICT_SHARE);

        report.requests += 1;
        match rota.assign(modality, skill, strict)? {
            AssignOutcome::Assigned(result) => {
                report.assigned += 1;
                report.overflow += usize::from(result.overflow);
                report.fallback += usize::from(result.fallback.is_some());
                *report.per_worker.entry(result.worker).or_insert(0) += 1;
            }
            AssignOutcome::NoAvailableWorker { reason } => {
                log::debug!("Unfilled {skill}/{modality} at {at}: {reason}");
                report.unfilled += 1;
            }
        }
    }

    // Credit the rest of the day's hours.
    if last > rota.now() {
        rota.advance_clock(last)?;
    }
    Ok(report)
}

pub fn print_summary(rota: &Rota, report: &SimReport) {
    let ledger = rota.ledger();
    println!("=== RUN SUMMARY ===");
    println!("  day:        {}", rota.day());
    println!("  clock:      {}", rota.now());
    println!("  requests:   {}", report.requests);
    println!("  assigned:   {}", report.assigned);
    println!("  overflow:   {}", report.overflow);
    println!("  fallback:   {}", report.fallback);
    println!("  unfilled:   {}", report.unfilled);
    println!();
    println!("=== WORKLOAD ===");
    if report.per_worker.is_empty() {
        println!("  (No assignments)");
        return;
    }
    for (worker, count) in &report.per_worker {
        println!(
            "  {worker:<12} | picks: {count:>4} | weighted: {:>7.2}",
            ledger.total_weighted(worker)
        );
    }
}
