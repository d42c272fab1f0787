//! Ingestion of posted event batches
//!
//! Turns a raw `POST /track` body into events ready for storage:
//!
//! 1. strip the optional `-` sentinel used by the agent's regular flush path
//! 2. parse the rest as JSON
//! 3. check every element against the event shape
//! 4. drop empty tags
//!
//! Beacon bodies arrive without the sentinel; both forms decode to the same
//! events.

mod validate;

pub use validate::is_valid_event;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::tracker::SENTINEL;
use crate::types::Event;

/// Error message for bodies that parse but are not an array of valid events
pub const INVALID_EVENTS: &str = "Invalid events format";

/// Decode and validate a posted body
pub fn decode_body(body: &str) -> Result<Vec<Event>> {
    let json = body.strip_prefix(SENTINEL).unwrap_or(body);
    let value: Value = serde_json::from_str(json)?;

    let items = match value {
        Value::Array(items) if items.iter().all(is_valid_event) => items,
        _ => return Err(Error::Validation(INVALID_EVENTS.to_string())),
    };

    items
        .into_iter()
        .map(|item| serde_json::from_value::<Event>(item).map_err(Error::from))
        .collect()
}

/// Remove empty tags from every event
pub fn normalize(events: Vec<Event>) -> Vec<Event> {
    events.into_iter().map(Event::without_empty_tags).collect()
}

/// Full ingestion path: decode, validate, normalize
pub fn prepare_batch(body: &str) -> Result<Vec<Event>> {
    decode_body(body).map(normalize)
}

/// Where accepted batches are persisted.
///
/// Returns the number of events stored.
pub trait EventSink: Send + Sync {
    fn insert_events(&self, events: &[Event]) -> Result<usize>;
}
