//! Event tracking agent
//!
//! Buffers events and flushes them in batches to the ingestion endpoint.
//!
//! ## Architecture
//!
//! - [`EventBuffer`]: ordered pending events, no network knowledge
//! - [`FlushController`]: send eligibility, sending, retry and the exit flush
//! - [`EventTracker`]: stamps events with the page context and feeds the controller
//!
//! `track()` never blocks and never fails; transport failures are retried
//! in the background at a fixed delay.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # async fn demo() -> pagetrack_core::Result<()> {
//! use pagetrack_core::tracker::EventTracker;
//! use pagetrack_core::{Config, LifecycleSignal, PageContext};
//!
//! let config = Config::load()?;
//! let tracker = EventTracker::connect(
//!     &config.tracker,
//!     PageContext::new("http://localhost:8080/1.html", "Home"),
//!     Vec::new(),
//! )?;
//!
//! tracker.track("click", ["nav", "header"]);
//! tracker.on_lifecycle(LifecycleSignal::Unload);
//! # Ok(())
//! # }
//! ```

mod buffer;
mod flush;
#[cfg(test)]
mod mock;
mod transport;

use std::sync::{Arc, Mutex, PoisonError};

pub use buffer::EventBuffer;
pub use flush::{FlushController, FlushPolicy, FlushStats, SendState};
pub use transport::{
    encode_batch, encode_beacon, Beacon, HttpBeacon, HttpTransport, Transport, SENTINEL,
};

use crate::config::TrackerConfig;
use crate::error::Result;
use crate::types::{Event, LifecycleSignal, PageContext, PendingCall};

/// The tracking agent for one page lifetime
pub struct EventTracker {
    controller: FlushController,
    page: Mutex<PageContext>,
}

impl EventTracker {
    /// Create a tracker with explicit transports
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &TrackerConfig,
        transport: Arc<dyn Transport>,
        beacon: Arc<dyn Beacon>,
        page: PageContext,
    ) -> Result<Self> {
        config.validate()?;
        let controller = FlushController::new(FlushPolicy::from_config(config), transport, beacon)?;

        tracing::debug!(
            url = %page.url,
            batch_size = config.batch_size,
            cooldown_ms = config.cooldown_ms,
            "Tracker initialized"
        );

        Ok(Self {
            controller,
            page: Mutex::new(page),
        })
    }

    /// Create a tracker and replay calls made before it existed, in order
    pub fn init(
        config: &TrackerConfig,
        transport: Arc<dyn Transport>,
        beacon: Arc<dyn Beacon>,
        page: PageContext,
        pending: impl IntoIterator<Item = PendingCall>,
    ) -> Result<Self> {
        let tracker = Self::new(config, transport, beacon, page)?;

        let mut replayed = 0usize;
        for call in pending {
            tracker.track(call.event, call.tags);
            replayed += 1;
        }
        if replayed > 0 {
            tracing::debug!(replayed, "Replayed queued track calls");
        }

        Ok(tracker)
    }

    /// Create a tracker posting to `config.endpoint` over HTTP
    pub fn connect(
        config: &TrackerConfig,
        page: PageContext,
        pending: impl IntoIterator<Item = PendingCall>,
    ) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config)?);
        let beacon = Arc::new(HttpBeacon::new(config)?);
        Self::init(config, transport, beacon, page, pending)
    }

    /// Record an event on the current page
    pub fn track<I, S>(&self, event: impl Into<String>, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = tags.into_iter().map(Into::into).collect();
        let event = Event::new(event, tags, &self.page());
        self.controller.enqueue(event);
    }

    /// Page lifecycle hook; the first signal with a non-empty buffer fires the exit beacon
    pub fn on_lifecycle(&self, signal: LifecycleSignal) -> bool {
        self.controller.exit_flush(signal)
    }

    /// Update the page context used for subsequent events
    pub fn set_page(&self, page: PageContext) {
        *self.page.lock().unwrap_or_else(PoisonError::into_inner) = page;
    }

    pub fn page(&self) -> PageContext {
        self.page
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn controller(&self) -> &FlushController {
        &self.controller
    }
}
