//! SQLite persistence for snapshots.
//!
//! RULE: Only store.rs talks to the database.
//! The engine never executes SQL; callers hand snapshots in and out.

use crate::{error::RotaResult, snapshot::RotaSnapshot};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Open (or create) the snapshot database at `path`.
    pub fn open(path: &str) -> RotaResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: readers do not block the writer.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> RotaResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> RotaResult<()> {
        self.conn
            .execute_batch(include_str!("../migrations/001_snapshots.sql"))?;
        Ok(())
    }

    /// Persist a snapshot. Returns its generated id.
    pub fn save_snapshot(&self, snapshot: &RotaSnapshot) -> RotaResult<String> {
        let snapshot_id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO rota_snapshot (snapshot_id, day, clock_time, state_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                snapshot_id,
                snapshot.clock.day.to_string(),
                snapshot.clock.now.to_string(),
                snapshot.to_json()?,
            ],
        )?;
        log::debug!("Snapshot {snapshot_id} saved for {} at {}", snapshot.clock.day, snapshot.clock.now);
        Ok(snapshot_id)
    }

    /// Most recently saved snapshot for `day`, if any.
    pub fn latest_snapshot(&self, day: NaiveDate) -> RotaResult<Option<RotaSnapshot>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT state_json FROM rota_snapshot
                 WHERE day = ?1
                 ORDER BY id DESC LIMIT 1",
                params![day.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| RotaSnapshot::from_json(&j)).transpose()
    }

    pub fn snapshot_count(&self) -> RotaResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM rota_snapshot", [], |row| row.get(0))?)
    }

    /// Drop snapshots older than `day`.
    pub fn prune_before(&self, day: NaiveDate) -> RotaResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM rota_snapshot WHERE day < ?1",
            params![day.to_string()],
        )?)
    }
}
