//! Simulation clock — owns tick state, simulated time, and pause.
//!
//! Time is simulated, never read from the host: every tick advances
//! `now_ms` by the configured interval. The wall-clock anchor is only
//! used to render human-readable labels.

use crate::types::{SessionId, Tick, Timestamp};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub session_id:   SessionId,
    pub current_tick: Tick,
    pub now_ms:       Timestamp,
    pub interval_ms:  u64,
    pub paused:       bool,
    pub started_at:   DateTime<Utc>,
}

impl SimClock {
    pub fn new(session_id: SessionId, interval_ms: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            current_tick: 0,
            now_ms: 0,
            interval_ms,
            paused: true,
            started_at,
        }
    }

    /// Advance one tick. Returns the new tick number.
    /// Panics if called while paused — callers must check.
    pub fn advance(&mut self) -> Tick {
        assert!(!self.paused, "advance() called on paused clock");
        self.current_tick += 1;
        self.now_ms += self.interval_ms;
        self.current_tick
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }

    /// Wall-clock instant corresponding to a simulated timestamp.
    pub fn wall_time(&self, at: Timestamp) -> DateTime<Utc> {
        self.started_at + Duration::milliseconds(at as i64)
    }

    /// `HH:MM:SS` label for a simulated timestamp.
    pub fn time_label(&self, at: Timestamp) -> String {
        self.wall_time(at).format("%H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn advance_moves_time_by_interval() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut clock = SimClock::new("s".into(), 1000, start);
        clock.resume();
        clock.advance();
        clock.advance();
        assert_eq!(clock.current_tick, 2);
        assert_eq!(clock.now_ms, 2000);
        assert_eq!(clock.time_label(clock.now_ms), "09:00:02");
    }

    #[test]
    #[should_panic(expected = "paused clock")]
    fn advance_while_paused_panics() {
        let mut clock = SimClock::new("s".into(), 1000, Utc::now());
        clock.advance();
    }
}
