//! Database connection and query operations.

use crate::{migrations, StoreError, StoreResult};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use telemetry_core::{DeviceInfo, Event, EventParams};
use tracing::{debug, warn};

/// SQLite database wrapper with query methods.
///
/// The connection sits behind a mutex so the database can be shared across
/// the dispatcher and the background worker; each method holds the lock for
/// exactly one statement (or one transaction), which makes every mutation
/// atomic per call.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a database at the given path, running migrations if needed.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode and performance optimizations
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        // Note: WAL mode doesn't apply to in-memory databases
        conn.execute_batch(
            "
            PRAGMA cache_size = -64000;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert events as unsent records.
    ///
    /// Idempotent: re-inserting an id replaces the existing row instead of
    /// duplicating it. Returns the number of rows written.
    pub fn insert_events(&self, events: &[Event]) -> StoreResult<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO events
                     (id, name, params, timestamp_ms, session_id, user_id, device_info, sent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
            )?;

            for event in events {
                let params_json = event
                    .params
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                let device_json = event
                    .device_info
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;

                stmt.execute(params![
                    event.id,
                    event.name,
                    params_json,
                    event.timestamp.timestamp_millis(),
                    event.session_id,
                    event.user_id,
                    device_json,
                ])?;
            }
        }
        tx.commit()?;

        debug!(count = events.len(), "Persisted events");
        Ok(events.len())
    }

    /// All unsent events, oldest first.
    pub fn pending_events(&self) -> StoreResult<Vec<Event>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, params, timestamp_ms, session_id, user_id, device_info
             FROM events WHERE sent = 0 ORDER BY timestamp_ms ASC, id ASC",
        )?;

        let events = stmt
            .query_map([], row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// Delete records by id, regardless of sent state.
    ///
    /// Idempotent: ids that are already gone are skipped without error.
    /// Returns the number of rows actually deleted.
    pub fn delete_events_by_ids(&self, ids: &[String]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM events WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;

        debug!(requested = ids.len(), deleted, "Removed events");
        Ok(deleted)
    }

    /// Mark records as sent. Records never move back to unsent.
    pub fn mark_events_sent(&self, ids: &[String]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare("UPDATE events SET sent = 1 WHERE id = ?1")?;
            for id in ids {
                updated += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;

        Ok(updated)
    }

    /// Total record count, sent and unsent.
    pub fn count_events(&self) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete the n oldest records by timestamp, irrespective of sent state.
    ///
    /// This is the capacity-eviction path: deliberate, bounded data loss
    /// under sustained overload. Returns the number of rows deleted.
    pub fn evict_oldest_events(&self, n: u64) -> StoreResult<u64> {
        if n == 0 {
            return Ok(0);
        }

        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM events WHERE id IN (
                SELECT id FROM events ORDER BY timestamp_ms ASC, id ASC LIMIT ?1
            )",
            params![n as i64],
        )?;

        debug!(requested = n, deleted, "Evicted oldest events");
        Ok(deleted as u64)
    }
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    let id: String = row.get(0)?;
    let params_json: Option<String> = row.get(2)?;
    let device_json: Option<String> = row.get(6)?;
    let timestamp_ms: i64 = row.get(3)?;

    // Corrupt JSON columns degrade to None; the loss is logged with the
    // row id.
    let params = params_json.and_then(|s| match serde_json::from_str::<EventParams>(&s) {
        Ok(params) => Some(params),
        Err(e) => {
            warn!(id = %id, error = %e, "Unreadable params column, dropping field");
            None
        }
    });
    let device_info = device_json.and_then(|s| match serde_json::from_str::<DeviceInfo>(&s) {
        Ok(info) => Some(info),
        Err(e) => {
            warn!(id = %id, error = %e, "Unreadable device_info column, dropping field");
            None
        }
    });

    Ok(Event {
        id,
        name: row.get(1)?,
        params,
        timestamp: parse_timestamp_ms(timestamp_ms),
        session_id: row.get(4)?,
        user_id: row.get(5)?,
        device_info,
    })
}

fn parse_timestamp_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}
