//! The shipped demo files load and drive a day end to end.

use rota_core::{config::RotaConfig, engine::Rota, intent::DayPlan, roster::Roster, types::ClockTime};

const DATA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");

#[test]
fn demo_day_runs() {
    let config = RotaConfig::load(&format!("{DATA}/config.json")).expect("config loads");
    let roster = Roster::load(&format!("{DATA}/roster.json")).expect("roster loads");
    let plan = DayPlan::load(&format!("{DATA}/day.json")).expect("day loads");
    assert_eq!(config.config_version, 2);
    assert_eq!(roster.len(), 4);

    let rota = Rota::new(config, roster, plan).expect("day builds");
    assert!(rota.schedule().carry_over_plan().is_some(), "night shift carries over");

    rota.advance_clock("09:00".parse::<ClockTime>().unwrap()).unwrap();
    let outcome = rota.assign("ct", "cardiac", false).unwrap();
    let worker = outcome.worker().expect("a cardiac reader is on CT");
    assert!(["AB", "EF"].contains(&worker), "picked {worker}");

    let at_board = rota.get_segments(rota.day(), "ct");
    assert!(at_board.iter().any(|s| s.worker == "AB" && s.is_gap()));
}
