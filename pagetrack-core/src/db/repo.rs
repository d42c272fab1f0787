//! Database repository layer
//!
//! Provides insert and query operations for tracked events.

use crate::error::Result;
use crate::ingest::EventSink;
use crate::types::Event;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// An event as stored by the ingestion endpoint
#[derive(Debug, Clone)]
pub struct StoredEvent {
    /// Row id (insertion order)
    pub id: i64,
    /// The event as accepted (empty tags already removed)
    pub event: Event,
    /// When the endpoint stored it
    pub received_at: DateTime<Utc>,
}

/// Database handle (single connection)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        super::schema::run_migrations(&conn)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a batch of events in one transaction
    pub fn insert_events(&self, events: &[Event]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let received_at = Utc::now().to_rfc3339();

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO tracks (event, tags, url, title, ts, received_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;

            for event in events {
                stmt.execute(params![
                    event.event,
                    serde_json::to_string(&event.tags)?,
                    event.url,
                    event.title,
                    event.ts,
                    received_at,
                ])?;
            }
        }

        tx.commit()?;
        Ok(events.len())
    }

    /// Count stored events
    pub fn count_events(&self) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))?;
        Ok(count)
    }

    /// Most recently stored events, oldest first
    pub fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, event, tags, url, title, ts, received_at
             FROM (SELECT * FROM tracks ORDER BY id DESC LIMIT ?)
             ORDER BY id ASC",
        )?;

        let events = stmt
            .query_map(params![limit as i64], Self::row_to_stored_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    fn row_to_stored_event(row: &Row) -> rusqlite::Result<StoredEvent> {
        let tags_json: String = row.get("tags")?;
        let received_at: String = row.get("received_at")?;

        Ok(StoredEvent {
            id: row.get("id")?,
            event: Event {
                event: row.get("event")?,
                tags: serde_json::from_str(&tags_json).unwrap_or_default(),
                url: row.get("url")?,
                title: row.get("title")?,
                ts: row.get("ts")?,
            },
            received_at: DateTime::parse_from_rfc3339(&received_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

impl EventSink for Database {
    fn insert_events(&self, events: &[Event]) -> Result<usize> {
        Database::insert_events(self, events)
    }
}
