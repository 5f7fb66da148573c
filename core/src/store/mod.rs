//! SQLite audit store for one session.
//!
//! RULE: Only store/ talks to the database.
//! The engine calls store methods; subsystems never see SQL.
//!
//! The store is always opened in memory. Nothing survives the session.

use crate::{
    error::SimResult,
    event::EventLogEntry,
    types::{SessionId, Tick},
};
use rusqlite::{params, Connection};

mod journal;

pub use journal::{JournalCategory, JournalEntry};

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_session.sql"))?;
        Ok(())
    }

    // ── Session ────────────────────────────────────────────────

    pub fn insert_session(
        &self,
        session_id: &str,
        seed: u64,
        version: &str,
        started_at: &str,
    ) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO session (session_id, seed, version, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, seed as i64, version, started_at],
        )?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (session_id, tick, subsystem, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.session_id,
                entry.tick as i64,
                entry.subsystem,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    fn query_events(&self, sql: &str, args: impl rusqlite::Params) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map(args, |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    session_id: row.get::<_, SessionId>(1)?,
                    tick:       row.get::<_, i64>(2)? as u64,
                    subsystem:  row.get(3)?,
                    event_type: row.get(4)?,
                    payload:    row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn events_for_tick(&self, session_id: &str, tick: Tick) -> SimResult<Vec<EventLogEntry>> {
        self.query_events(
            "SELECT id, session_id, tick, subsystem, event_type, payload
             FROM event_log WHERE session_id = ?1 AND tick = ?2
             ORDER BY id ASC",
            params![session_id, tick as i64],
        )
    }

    /// The whole log, in insertion order.
    pub fn all_events(&self, session_id: &str) -> SimResult<Vec<EventLogEntry>> {
        self.query_events(
            "SELECT id, session_id, tick, subsystem, event_type, payload
             FROM event_log WHERE session_id = ?1
             ORDER BY id ASC",
            params![session_id],
        )
    }

    pub fn event_count_by_type(&self, session_id: &str, event_type: &str) -> SimResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE session_id = ?1 AND event_type = ?2",
            params![session_id, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SimStore {
        let store = SimStore::in_memory().unwrap();
        store.migrate().unwrap();
        store.insert_session("s1", 7, "test", "2026-01-01T00:00:00Z").unwrap();
        store
    }

    fn entry(tick: Tick, event_type: &str) -> EventLogEntry {
        EventLogEntry {
            id: None,
            session_id: "s1".into(),
            tick,
            subsystem: "engine".into(),
            event_type: event_type.into(),
            payload: "{}".into(),
        }
    }

    #[test]
    fn events_come_back_in_insert_order() {
        let store = store();
        store.append_event(&entry(1, "tick_started")).unwrap();
        store.append_event(&entry(1, "service_ready")).unwrap();
        store.append_event(&entry(2, "tick_started")).unwrap();

        let tick1: Vec<_> = store
            .events_for_tick("s1", 1)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(tick1, vec!["tick_started", "service_ready"]);
        assert_eq!(store.all_events("s1").unwrap().len(), 3);
        assert_eq!(store.event_count_by_type("s1", "tick_started").unwrap(), 2);
    }

    #[test]
    fn events_require_a_session_row() {
        let store = store();
        let mut orphan = entry(1, "tick_started");
        orphan.session_id = "nope".into();
        assert!(store.append_event(&orphan).is_err());
    }
}
