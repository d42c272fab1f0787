//! Mock transports for testing the flush controller

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::Event;

use super::transport::{Beacon, Transport, SENTINEL};

/// Let spawned send tasks run without advancing the (paused) clock
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Records every body it is asked to send.
///
/// Outcomes are scripted: each queued `true` fails one call, in order.
/// Calls beyond the script succeed.
#[derive(Default)]
pub struct MockTransport {
    bodies: Mutex<Vec<String>>,
    accepted: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<bool>>,
    latency: Duration,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_first(n: usize) -> Arc<Self> {
        Self::scripted(&vec![true; n])
    }

    /// One outcome per call, `true` meaning the call fails
    pub fn scripted(outcomes: &[bool]) -> Arc<Self> {
        Self::scripted_with_latency(outcomes, Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Self::scripted_with_latency(&[], latency)
    }

    pub fn scripted_with_latency(outcomes: &[bool], latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(outcomes.iter().copied().collect()),
            latency,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }

    /// Decoded payloads, one per call
    pub fn payloads(&self) -> Vec<Vec<Event>> {
        decode(&self.bodies())
    }

    /// Decoded payloads of calls that succeeded, in completion order
    pub fn accepted_payloads(&self) -> Vec<Vec<Event>> {
        decode(&self.accepted.lock().unwrap())
    }
}

fn decode(bodies: &[String]) -> Vec<Vec<Event>> {
    bodies
        .iter()
        .map(|body| {
            let json = body
                .strip_prefix(SENTINEL)
                .expect("regular sends carry the sentinel");
            serde_json::from_str(json).expect("body is a JSON event array")
        })
        .collect()
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, body: String) -> Result<()> {
        self.bodies.lock().unwrap().push(body.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let fail = self.failures.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            return Err(Error::Transport("simulated network error".to_string()));
        }
        self.accepted.lock().unwrap().push(body);
        Ok(())
    }
}

/// Records every beacon body
#[derive(Default)]
pub struct MockBeacon {
    bodies: Mutex<Vec<String>>,
}

impl MockBeacon {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<Vec<Event>> {
        self.bodies()
            .iter()
            .map(|body| serde_json::from_str(body).expect("beacon body is a JSON event array"))
            .collect()
    }
}

impl Beacon for MockBeacon {
    fn send_beacon(&self, body: String) {
        self.bodies.lock().unwrap().push(body);
    }
}
