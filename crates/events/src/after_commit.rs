//! After-commit buffering for signals raised inside a unit of work.
//!
//! A service stages signals while it prepares a write, then either commits the
//! buffer (write succeeded) or discards it (write failed / rolled back). Nothing
//! reaches the bus before the write is durable.

use tracing::{debug, warn};

use crate::bus::EventBus;

/// Signals staged during a unit of work.
#[derive(Debug)]
#[must_use = "staged signals are lost unless committed or explicitly discarded"]
pub struct AfterCommit<M> {
    pending: Vec<M>,
}

impl<M> Default for AfterCommit<M> {
    fn default() -> Self {
        Self { pending: Vec::new() }
    }
}

impl<M> AfterCommit<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a message for publication once the owning write commits.
    pub fn defer(&mut self, message: M) {
        self.pending.push(message);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[M] {
        &self.pending
    }

    /// Publish every staged message. Returns how many were accepted by the bus.
    ///
    /// Publish failures are logged and skipped; the write has already committed,
    /// so there is nothing to roll back.
    pub fn commit<B>(self, bus: &B) -> usize
    where
        B: EventBus<M> + ?Sized,
    {
        let total = self.pending.len();
        let mut published = 0;
        for message in self.pending {
            match bus.publish(message) {
                Ok(()) => published += 1,
                Err(e) => warn!(error = ?e, "failed to publish committed signal"),
            }
        }
        debug!(published, total, "after-commit signals released");
        published
    }

    /// Drop every staged message. Returns how many were dropped.
    pub fn discard(self) -> usize {
        let dropped = self.pending.len();
        if dropped > 0 {
            debug!(dropped, "discarding staged signals (write did not commit)");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventBus, InMemoryEventBus};

    #[test]
    fn nothing_is_published_before_commit() {
        let bus = InMemoryEventBus::<&'static str>::new();
        let sub = bus.subscribe();

        let mut staged = AfterCommit::new();
        staged.defer("low-stock");
        assert!(sub.try_recv().is_err());

        assert_eq!(staged.commit(&bus), 1);
        assert_eq!(sub.drain(), vec!["low-stock"]);
    }

    #[test]
    fn discard_never_reaches_the_bus() {
        let bus = InMemoryEventBus::<&'static str>::new();
        let sub = bus.subscribe();

        let mut staged = AfterCommit::new();
        staged.defer("low-stock");
        staged.defer("low-stock-2");

        assert_eq!(staged.discard(), 2);
        assert!(sub.drain().is_empty());
    }
}
