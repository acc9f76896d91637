// SQLite-backed navigation history: sessions and per-step events, queried
// back out for the optimizer feedback loop.

use crate::error::Result;
use crate::model::{EventOutcome, NavigationEvent, PerformanceMetrics};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub struct HistoryStore {
    conn: Connection,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl HistoryStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Optimize for concurrent writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let store = HistoryStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = HistoryStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS nav_sessions (
    id TEXT PRIMARY KEY,
    graph_id TEXT NOT NULL,
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed', 'cancelled')),
    plan_id TEXT,
    adaptations INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS nav_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    event_id TEXT UNIQUE NOT NULL,
    route_id TEXT NOT NULL,
    context_before TEXT NOT NULL,
    context_after TEXT NOT NULL,
    outcome TEXT NOT NULL CHECK(outcome IN ('success', 'failure', 'timeout', 'detected', 'redirected')),
    duration_ms INTEGER NOT NULL DEFAULT 0,
    error_code TEXT,
    error_details TEXT,
    stealth_before REAL NOT NULL,
    stealth_after REAL NOT NULL,
    detection_triggers TEXT,  -- JSON array
    recorded_at INTEGER NOT NULL,
    FOREIGN KEY(session_id) REFERENCES nav_sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_events_session ON nav_events(session_id);
CREATE INDEX IF NOT EXISTS idx_events_route ON nav_events(route_id);
CREATE INDEX IF NOT EXISTS idx_events_outcome ON nav_events(outcome);
            ",
        )?;
        Ok(())
    }

    pub fn create_session(
        &self,
        session_id: &str,
        graph_id: &str,
        source: &str,
        target: &str,
        plan_id: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO nav_sessions (id, graph_id, source, target, start_time, status, plan_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session_id,
                graph_id,
                source,
                target,
                current_timestamp(),
                "running",
                plan_id
            ],
        )?;
        Ok(())
    }

    pub fn complete_session(&self, session_id: &str, adaptations: u32) -> Result<()> {
        self.finish_session(session_id, "completed", adaptations)
    }

    pub fn fail_session(&self, session_id: &str, adaptations: u32) -> Result<()> {
        self.finish_session(session_id, "failed", adaptations)
    }

    pub fn cancel_session(&self, session_id: &str, adaptations: u32) -> Result<()> {
        self.finish_session(session_id, "cancelled", adaptations)
    }

    fn finish_session(&self, session_id: &str, status: &str, adaptations: u32) -> Result<()> {
        self.conn.execute(
            "UPDATE nav_sessions SET status = ?1, end_time = ?2, adaptations = ?3 WHERE id = ?4",
            params![status, current_timestamp(), adaptations, session_id],
        )?;
        Ok(())
    }

    pub fn session_status(&self, session_id: &str) -> Result<Option<String>> {
        let status = self
            .conn
            .query_row(
                "SELECT status FROM nav_sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status)
    }

    pub fn insert_event(&self, session_id: &str, event: &NavigationEvent) -> Result<i64> {
        let triggers = serde_json::to_string(&event.detection_triggers)?;
        self.conn.execute(
            "INSERT INTO nav_events (
                session_id, event_id, route_id, context_before, context_after,
                outcome, duration_ms, error_code, error_details,
                stealth_before, stealth_after, detection_triggers, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                session_id,
                &event.event_id,
                &event.route_id,
                &event.context_before,
                &event.context_after,
                event.outcome.as_str(),
                event.metrics.duration_ms as i64,
                &event.error_code,
                &event.error_details,
                event.stealth_score_before,
                event.stealth_score_after,
                triggers,
                current_timestamp(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Events for one session in insertion order.
    pub fn events_for_session(&self, session_id: &str) -> Result<Vec<NavigationEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, route_id, context_before, context_after, outcome,
                    duration_ms, error_code, error_details, stealth_before,
                    stealth_after, detection_triggers
             FROM nav_events WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], row_to_event)?;
        collect_events(rows)
    }

    /// All recorded events for one route, feeding the optimizer.
    pub fn events_for_route(&self, route_id: &str) -> Result<Vec<NavigationEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, route_id, context_before, context_after, outcome,
                    duration_ms, error_code, error_details, stealth_before,
                    stealth_after, detection_triggers
             FROM nav_events WHERE route_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![route_id], row_to_event)?;
        collect_events(rows)
    }

    /// The most recent events across all sessions, newest last.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<NavigationEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, route_id, context_before, context_after, outcome,
                    duration_ms, error_code, error_details, stealth_before,
                    stealth_after, detection_triggers
             FROM nav_events ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], row_to_event)?;
        let mut events = collect_events(rows)?;
        events.reverse();
        Ok(events)
    }

    pub fn event_count(&self) -> Result<i64> {
        let count =
            self.conn
                .query_row("SELECT COUNT(*) FROM nav_events", [], |row| row.get(0))?;
        Ok(count)
    }
}

type EventRow = (
    String,
    String,
    String,
    String,
    String,
    i64,
    Option<String>,
    Option<String>,
    f64,
    f64,
    Option<String>,
);

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn collect_events(
    rows: impl Iterator<Item = rusqlite::Result<EventRow>>,
) -> Result<Vec<NavigationEvent>> {
    let mut events = Vec::new();
    for row in rows {
        let (
            event_id,
            route_id,
            context_before,
            context_after,
            outcome,
            duration_ms,
            error_code,
            error_details,
            stealth_before,
            stealth_after,
            triggers,
        ) = row?;

        let outcome = EventOutcome::from_str(&outcome).unwrap_or(EventOutcome::Failure);
        let mut event = NavigationEvent::new(
            route_id,
            context_before,
            context_after,
            outcome,
            stealth_before.clamp(0.0, 1.0),
            stealth_after.clamp(0.0, 1.0),
        )?;
        event.event_id = event_id;
        event.metrics = PerformanceMetrics {
            duration_ms: duration_ms.max(0) as u64,
            ..PerformanceMetrics::default()
        };
        event.error_code = error_code;
        event.error_details = error_details;
        if let Some(raw) = triggers {
            event.detection_triggers = serde_json::from_str(&raw).unwrap_or_default();
        }
        events.push(event);
    }
    debug!(events = events.len(), "loaded navigation events");
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(route_id: &str, outcome: EventOutcome) -> NavigationEvent {
        let mut ev =
            NavigationEvent::new(route_id, "home", "products", outcome, 0.1, 0.2).unwrap();
        ev.metrics.duration_ms = 1500;
        ev
    }

    #[test]
    fn test_session_lifecycle() {
        let store = HistoryStore::open_in_memory().unwrap();
        store
            .create_session("s1", "g1", "home", "checkout", "p1")
            .unwrap();
        assert_eq!(store.session_status("s1").unwrap().as_deref(), Some("running"));

        store.complete_session("s1", 2).unwrap();
        assert_eq!(
            store.session_status("s1").unwrap().as_deref(),
            Some("completed")
        );
        assert!(store.session_status("missing").unwrap().is_none());
    }

    #[test]
    fn test_event_round_trip() {
        let store = HistoryStore::open_in_memory().unwrap();
        store
            .create_session("s1", "g1", "home", "checkout", "p1")
            .unwrap();

        let mut ev = sample_event("home->products", EventOutcome::Failure);
        ev = ev.with_error("timeout", "step exceeded deadline");
        store.insert_event("s1", &ev).unwrap();

        let loaded = store.events_for_session("s1").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].event_id, ev.event_id);
        assert_eq!(loaded[0].outcome, EventOutcome::Failure);
        assert_eq!(loaded[0].error_code.as_deref(), Some("timeout"));
        assert_eq!(loaded[0].metrics.duration_ms, 1500);
    }

    #[test]
    fn test_events_for_route_filters() {
        let store = HistoryStore::open_in_memory().unwrap();
        store
            .create_session("s1", "g1", "home", "checkout", "p1")
            .unwrap();
        store
            .insert_event("s1", &sample_event("r1", EventOutcome::Success))
            .unwrap();
        store
            .insert_event("s1", &sample_event("r2", EventOutcome::Success))
            .unwrap();
        store
            .insert_event("s1", &sample_event("r1", EventOutcome::Timeout))
            .unwrap();

        let r1 = store.events_for_route("r1").unwrap();
        assert_eq!(r1.len(), 2);
        assert!(r1.iter().all(|e| e.route_id == "r1"));
        assert_eq!(store.event_count().unwrap(), 3);
    }

    #[test]
    fn test_recent_events_ordering() {
        let store = HistoryStore::open_in_memory().unwrap();
        store
            .create_session("s1", "g1", "home", "checkout", "p1")
            .unwrap();
        for i in 0..5 {
            store
                .insert_event("s1", &sample_event(&format!("r{}", i), EventOutcome::Success))
                .unwrap();
        }

        let recent = store.recent_events(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].route_id, "r3");
        assert_eq!(recent[1].route_id, "r4");
    }
}
