//! rota-runner: headless driver for the rota engine.
//!
//! Usage:
//!   rota-runner --config data/config.json --roster data/roster.json --day data/day.json
//!   rota-runner ... --seed 12345 --requests 500 --db rota.db
//!   rota-runner ... --date 2026-03-03   (replay the day file on another date)
//!   rota-runner ... --ipc-mode

mod sim;

use anyhow::Result;
use chrono::NaiveDate;
use rota_core::{
    config::RotaConfig,
    engine::Rota,
    intent::{DayPlan, IntentDelta},
    roster::Roster,
    store::SnapshotStore,
    types::ClockTime,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Assign {
        modality: String,
        skill: String,
        #[serde(default)]
        strict: bool,
    },
    Segments {
        modality: String,
    },
    Edit {
        delta: IntentDelta,
    },
    Advance {
        to: String,
    },
    Ledger {
        worker: String,
        skill: String,
        modality: String,
    },
    LoadDay {
        path: String,
    },
    ReloadRoster {
        path: String,
    },
    ResetLedger,
    Snapshot,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_path = str_arg(&args, "--config", "./data/config.json");
    let roster_path = str_arg(&args, "--roster", "./data/roster.json");
    let day_path = str_arg(&args, "--day", "./data/day.json");
    let db = str_arg(&args, "--db", ":memory:");
    let seed = parse_arg(&args, "--seed", 42u64);
    let requests = parse_arg(&args, "--requests", 200usize);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");

    let config = RotaConfig::load(config_path)?;
    let roster = Roster::load(roster_path)?;
    let mut plan = DayPlan::load(day_path)?;
    if let Some(date) = args.windows(2).find(|w| w[0] == "--date").map(|w| w[1].as_str()) {
        plan.day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Invalid --date '{date}': {e}"))?;
    }

    if !ipc_mode {
        println!("rota-runner");
        println!("  config:    {config_path}");
        println!("  roster:    {roster_path} ({} workers)", roster.len());
        println!("  day:       {} ({} shifts, {} gaps)", plan.day, plan.shifts.len(), plan.gaps.len());
        println!("  seed:      {seed}");
        println!("  requests:  {requests}");
        println!("  db:        {db}");
        println!();
    }

    let store = SnapshotStore::open(db)?;
    store.migrate()?;

    let rota = match store.latest_snapshot(plan.day)? {
        Some(snapshot) => {
            log::info!("Resuming {} from stored snapshot at {}", plan.day, snapshot.clock.now);
            Rota::restore(config.clone(), roster, snapshot)?
        }
        None => Rota::new(config.clone(), roster, plan)?,
    };

    if ipc_mode {
        run_ipc_loop(&rota, &store)?;
    } else {
        let report = sim::run(&rota, &config, seed, requests)?;
        store.save_snapshot(&rota.snapshot())?;
        sim::print_summary(&rota, &report);
    }

    Ok(())
}

/// One JSON command per stdin line, one JSON reply per stdout line.
fn run_ipc_loop(rota: &Rota, store: &SnapshotStore) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                reply(&mut stdout, serde_json::json!({ "error": e.to_string() }))?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let response = match handle_command(rota, store, cmd) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Command failed: {e}");
                serde_json::json!({ "error": e.to_string() })
            }
        };
        reply(&mut stdout, response)?;
    }
    Ok(())
}

fn handle_command(rota: &Rota, store: &SnapshotStore, cmd: IpcCommand) -> Result<serde_json::Value> {
    let value = match cmd {
        IpcCommand::Assign {
            modality,
            skill,
            strict,
        } => serde_json::to_value(rota.assign(&modality, &skill, strict)?)?,
        IpcCommand::Segments { modality } => serde_json::to_value(rota.get_segments(rota.day(), &modality))?,
        IpcCommand::Edit { delta } => {
            let worker = rota.apply_edit(delta)?;
            serde_json::json!({ "recomputed": worker })
        }
        IpcCommand::Advance { to } => {
            let to: ClockTime = to.parse()?;
            rota.advance_clock(to)?;
            serde_json::json!({ "now": rota.now() })
        }
        IpcCommand::Ledger {
            worker,
            skill,
            modality,
        } => {
            let record = rota.ledger_record(&worker, &skill, &modality);
            serde_json::json!({
                "weighted_count": record.weighted_count,
                "hours_worked": record.hours_worked,
                "ratio": record.ratio(),
            })
        }
        IpcCommand::LoadDay { path } => {
            rota.load_day(DayPlan::load(&path)?)?;
            serde_json::json!({ "day": rota.day() })
        }
        IpcCommand::ReloadRoster { path } => {
            let dropped = rota.reload_roster(Roster::load(&path)?)?;
            serde_json::json!({ "dropped_manual_values": dropped })
        }
        IpcCommand::ResetLedger => {
            rota.reset_ledger();
            serde_json::json!({ "ledger": "reset" })
        }
        IpcCommand::Snapshot => {
            let id = store.save_snapshot(&rota.snapshot())?;
            serde_json::json!({ "snapshot_id": id })
        }
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn reply(stdout: &mut io::Stdout, value: serde_json::Value) -> Result<()> {
    writeln!(stdout, "{value}")?;
    stdout.flush()?;
    Ok(())
}

fn str_arg<'a>(args: &'a [String], flag: &str, default: &'a str) -> &'a str {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .unwrap_or(default)
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
