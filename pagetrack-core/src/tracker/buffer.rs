//! Ordered buffer of events waiting to be sent

use crate::types::Event;

/// Insertion-ordered queue of pending events.
///
/// Has no network knowledge. The owning [`FlushController`](super::FlushController)
/// holds it behind its state lock, which is what makes `drain_all` indivisible
/// with respect to `append`.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Vec<Event>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Remove and return every buffered event, leaving the buffer empty.
    pub fn drain_all(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Put an unsent payload back ahead of anything appended since it was drained.
    pub fn requeue(&mut self, mut payload: Vec<Event>) {
        if payload.is_empty() {
            return;
        }
        payload.append(&mut self.events);
        self.events = payload;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.clone()
    }
}
