//! Flush controller: decides when to send, sends, retries, and handles page exit
//!
//! ## State machine
//!
//! ```text
//!            eligible trigger
//!   IDLE  ───────────────────▶  SENDING
//!    ▲                             │
//!    └──────── request settles ────┘
//! ```
//!
//! The in-flight flag drops as soon as the request settles. A failed payload
//! is parked and requeued only after `retry_delay`, so a new trigger inside
//! that window may start a second send with a disjoint payload.
//!
//! The exit flush is a one-shot side transition that can happen in either
//! state. It takes parked payloads along with the buffer; a retry whose
//! payload was taken does nothing.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::Instant;

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::types::{Event, LifecycleSignal};

use super::buffer::EventBuffer;
use super::transport::{encode_batch, encode_beacon, Beacon, Transport};

/// When a buffered batch is allowed to go out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Buffer size that triggers a send regardless of the cool-down
    pub batch_size: usize,
    /// Minimum time between send attempts while below `batch_size`
    pub cooldown: Duration,
    /// Delay before a failed payload is requeued
    pub retry_delay: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

impl FlushPolicy {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            cooldown: config.cooldown(),
            retry_delay: config.retry_delay(),
        }
    }

    /// Size-or-time trigger.
    ///
    /// No send while one is in flight or the buffer is empty. Otherwise send
    /// once the buffer reaches `batch_size` or the cool-down since the last
    /// attempt has elapsed. A controller that never sent is past its cool-down.
    pub fn should_send(&self, state: &SendState, buffered: usize, now: Instant) -> bool {
        if state.is_sending || buffered == 0 {
            return false;
        }
        if buffered >= self.batch_size {
            return true;
        }
        match state.last_sent_at {
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
            None => true,
        }
    }
}

/// Send bookkeeping for one controller (one page lifetime)
#[derive(Debug, Clone, Copy, Default)]
pub struct SendState {
    /// A regular send is in flight
    pub is_sending: bool,
    /// When the last send attempt started
    pub last_sent_at: Option<Instant>,
    /// The exit beacon has been fired
    pub leave_flush_sent: bool,
}

/// Flush statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushStats {
    /// Regular send attempts, including retries
    pub attempts: usize,
    /// Attempts that ended in a transport failure
    pub failures: usize,
    /// Events acknowledged by a success status
    pub events_sent: usize,
    /// Events handed to the exit beacon
    pub events_beaconed: usize,
}

struct ControllerState {
    buffer: EventBuffer,
    send: SendState,
    stats: FlushStats,
    /// Failed payloads waiting out the retry delay, keyed by ticket
    retrying: BTreeMap<u64, Vec<Event>>,
    next_ticket: u64,
}

impl ControllerState {
    fn park(&mut self, payload: Vec<Event>) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.retrying.insert(ticket, payload);
        ticket
    }

    fn retrying_count(&self) -> usize {
        self.retrying.values().map(Vec::len).sum()
    }
}

struct Shared {
    state: Mutex<ControllerState>,
    policy: FlushPolicy,
    transport: Arc<dyn Transport>,
    beacon: Arc<dyn Beacon>,
    runtime: Handle,
}

/// Owns the event buffer and gates network sends behind [`FlushPolicy`].
///
/// Cloning gives another handle to the same controller. The state lock is
/// never held across an await point. Appending, requeueing and the
/// check-and-drain that starts a send each happen under one acquisition.
#[derive(Clone)]
pub struct FlushController {
    shared: Arc<Shared>,
}

impl FlushController {
    /// Create a controller bound to the current tokio runtime.
    pub fn new(
        policy: FlushPolicy,
        transport: Arc<dyn Transport>,
        beacon: Arc<dyn Beacon>,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("flush controller needs a tokio runtime: {}", e)))?;

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState {
                    buffer: EventBuffer::new(),
                    send: SendState::default(),
                    stats: FlushStats::default(),
                    retrying: BTreeMap::new(),
                    next_ticket: 0,
                }),
                policy,
                transport,
                beacon,
                runtime,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn policy(&self) -> FlushPolicy {
        self.shared.policy
    }

    /// Buffer an event and evaluate send eligibility
    pub fn enqueue(&self, event: Event) {
        let payload = {
            let mut state = self.lock();
            state.buffer.append(event);
            self.begin_send(&mut state)
        };
        if let Some(payload) = payload {
            self.dispatch(payload);
        }
    }

    /// Start a send if the policy allows it.
    ///
    /// Returns true if a send was started.
    pub fn consider_flush(&self) -> bool {
        let payload = self.begin_send(&mut self.lock());
        match payload {
            Some(payload) => self.dispatch(payload),
            None => false,
        }
    }

    /// Check eligibility and, if allowed, mark in flight and drain the buffer
    fn begin_send(&self, state: &mut ControllerState) -> Option<Vec<Event>> {
        let now = Instant::now();
        if !self
            .shared
            .policy
            .should_send(&state.send, state.buffer.len(), now)
        {
            return None;
        }
        state.send.is_sending = true;
        state.send.last_sent_at = Some(now);
        state.stats.attempts += 1;
        Some(state.buffer.drain_all())
    }

    fn dispatch(&self, payload: Vec<Event>) -> bool {
        let body = match encode_batch(&payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode event batch");
                let mut state = self.lock();
                state.send.is_sending = false;
                state.buffer.requeue(payload);
                return false;
            }
        };

        tracing::debug!(events = payload.len(), "Sending event batch");

        let controller = self.clone();
        self.shared
            .runtime
            .spawn(async move { controller.deliver(payload, body).await });
        true
    }

    async fn deliver(self, payload: Vec<Event>, body: String) {
        let result = self.shared.transport.send(body).await;
        let events = payload.len();

        let settled = {
            let mut state = self.lock();
            state.send.is_sending = false;
            match result {
                Ok(()) => {
                    state.stats.events_sent += events;
                    Ok(())
                }
                Err(e) => {
                    state.stats.failures += 1;
                    Err((e, state.park(payload)))
                }
            }
        };

        let (error, ticket) = match settled {
            Ok(()) => {
                tracing::debug!(events, "Event batch accepted");
                return;
            }
            Err(parked) => parked,
        };

        let retry_delay = self.shared.policy.retry_delay;
        tracing::warn!(
            error = %error,
            events,
            retry_in_ms = retry_delay.as_millis() as u64,
            "Failed to send events"
        );

        tokio::time::sleep(retry_delay).await;

        let payload = {
            let mut state = self.lock();
            match state.retrying.remove(&ticket) {
                Some(parked) => {
                    state.buffer.requeue(parked);
                    self.begin_send(&mut state)
                }
                // Taken by the exit flush
                None => None,
            }
        };
        if let Some(payload) = payload {
            self.dispatch(payload);
        }
    }

    /// Exit flush for a page lifecycle signal.
    ///
    /// Fires the beacon at most once per controller, carrying payloads still
    /// waiting to be retried followed by the buffer. Returns true if the
    /// beacon was fired.
    pub fn exit_flush(&self, signal: LifecycleSignal) -> bool {
        let payload = {
            let mut state = self.lock();
            if state.send.leave_flush_sent
                || (state.buffer.is_empty() && state.retrying.is_empty())
            {
                return false;
            }
            state.send.leave_flush_sent = true;
            let mut payload: Vec<Event> = std::mem::take(&mut state.retrying)
                .into_values()
                .flatten()
                .collect();
            payload.extend(state.buffer.drain_all());
            state.stats.events_beaconed += payload.len();
            payload
        };

        match encode_beacon(&payload) {
            Ok(body) => {
                tracing::info!(
                    signal = signal.as_str(),
                    events = payload.len(),
                    "Sending exit beacon"
                );
                self.shared.beacon.send_beacon(body);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode exit beacon");
                false
            }
        }
    }

    /// Copy of the buffered events, oldest first
    pub fn pending(&self) -> Vec<Event> {
        self.lock().buffer.snapshot()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_sending(&self) -> bool {
        self.lock().send.is_sending
    }

    /// Events held by failed sends until their retry delay passes
    pub fn retrying_count(&self) -> usize {
        self.lock().retrying_count()
    }

    /// A send is in flight or a failed payload is waiting to be retried
    pub fn has_outstanding(&self) -> bool {
        let state = self.lock();
        state.send.is_sending || !state.retrying.is_empty()
    }

    pub fn exit_flushed(&self) -> bool {
        self.lock().send.leave_flush_sent
    }

    pub fn send_state(&self) -> SendState {
        self.lock().send
    }

    pub fn stats(&self) -> FlushStats {
        self.lock().stats.clone()
    }
}
