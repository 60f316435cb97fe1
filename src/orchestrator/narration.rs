//! Narration speaking-state broadcast
//!
//! The narration side publishes "speaking started/stopped"; the orchestrator
//! (and anything else) subscribes. Plain std channels: publishing never
//! blocks and dropped receivers are pruned on the next publish.

use std::sync::mpsc::{channel, Receiver, Sender};

use tracing::debug;

#[derive(Debug, Default)]
pub struct NarrationBus {
    subscribers: Vec<Sender<bool>>,
    speaking: bool,
}

impl NarrationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// New receiver of every future state change
    pub fn subscribe(&mut self) -> Receiver<bool> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Last published state
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Broadcast a state change to every live subscriber
    pub fn publish(&mut self, speaking: bool) {
        self.speaking = speaking;
        let before = self.subscribers.len();
        self.subscribers.retain(|tx| tx.send(speaking).is_ok());
        let pruned = before - self.subscribers.len();
        if pruned > 0 {
            debug!(pruned, "dropped narration subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let mut bus = NarrationBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(true);
        bus.publish(false);
        assert_eq!(a.try_iter().collect::<Vec<_>>(), vec![true, false]);
        assert_eq!(b.try_iter().collect::<Vec<_>>(), vec![true, false]);
        assert!(!bus.is_speaking());
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let mut bus = NarrationBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        bus.publish(true);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.try_recv().ok(), Some(true));
    }
}
