//! Core domain types for pagetrack
//!
//! These types are shared by the tracking agent, the ingestion endpoint
//! and the storage layer.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A single recorded user action.
///
/// Serialized field names match the wire format accepted by `POST /track`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event name (e.g. "click", "signup")
    pub event: String,
    /// Free-form tags, in the order they were given
    pub tags: Vec<String>,
    /// URL of the page the event happened on
    pub url: String,
    /// Title of the page the event happened on
    pub title: String,
    /// Unix timestamp in seconds
    pub ts: i64,
}

impl Event {
    /// Create an event stamped with the current time and the given page.
    pub fn new(event: impl Into<String>, tags: Vec<String>, page: &PageContext) -> Self {
        Self {
            event: event.into(),
            tags,
            url: page.url.clone(),
            title: page.title.clone(),
            ts: Utc::now().timestamp(),
        }
    }

    /// Drop empty tags. Producers keep them; the server strips them before storage.
    pub fn without_empty_tags(mut self) -> Self {
        self.tags.retain(|tag| !tag.is_empty());
        self
    }
}

/// The page the agent is embedded in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    pub url: String,
    pub title: String,
}

impl PageContext {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// A `track` call recorded before the agent finished initializing.
///
/// Deserializes from the array form `["event", "tag1", "tag2"]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct PendingCall {
    pub event: String,
    pub tags: Vec<String>,
}

impl PendingCall {
    pub fn new(event: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            event: event.into(),
            tags,
        }
    }
}

impl TryFrom<Vec<String>> for PendingCall {
    type Error = String;

    fn try_from(mut args: Vec<String>) -> Result<Self, Self::Error> {
        if args.is_empty() {
            return Err("queued call must name an event".to_string());
        }
        let event = args.remove(0);
        Ok(Self { event, tags: args })
    }
}

/// Page lifecycle signals that trigger the exit flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The page is being hidden or is about to unload
    Hide,
    /// The page is unloading
    Unload,
}

impl LifecycleSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleSignal::Hide => "hide",
            LifecycleSignal::Unload => "unload",
        }
    }
}
