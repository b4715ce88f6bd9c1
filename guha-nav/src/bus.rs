//! In-process publish/subscribe channels.
//!
//! Publishers keep a list of bounded subscriber channels. Building a
//! diagnostic cloud is only worth it when somebody listens, so publishers
//! expose their subscriber count and the node checks it before assembling
//! large messages. Slow subscribers lose messages rather than block the
//! publisher.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

/// A fan-out publisher with bounded per-subscriber queues.
pub struct Publisher<T: Clone> {
    queue_size: usize,
    subscribers: Mutex<Vec<Sender<T>>>,
}

impl<T: Clone> Publisher<T> {
    pub fn new(queue_size: usize) -> Self {
        Self {
            queue_size: queue_size.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Open a new subscription.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = bounded(self.queue_size);
        self.subscribers.lock().push(tx);
        rx
    }

    /// True when at least one live subscriber exists.
    pub fn has_subscribers(&self) -> bool {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_disconnected());
        !subscribers.is_empty()
    }

    /// Deliver `message` to every live subscriber; full queues drop the
    /// message for that subscriber. Returns the number of deliveries.
    pub fn publish(&self, message: T) -> usize {
        let mut subscribers = self.subscribers.lock();
        let mut delivered = 0;
        subscribers.retain(|tx| match tx.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subscribers() {
        let publisher: Publisher<u32> = Publisher::new(4);
        assert!(!publisher.has_subscribers());
        assert_eq!(publisher.publish(1), 0);
    }

    #[test]
    fn test_fan_out() {
        let publisher: Publisher<u32> = Publisher::new(4);
        let a = publisher.subscribe();
        let b = publisher.subscribe();
        assert!(publisher.has_subscribers());

        assert_eq!(publisher.publish(7), 2);
        assert_eq!(a.recv().unwrap(), 7);
        assert_eq!(b.recv().unwrap(), 7);
    }

    #[test]
    fn test_dropped_subscriber_pruned() {
        let publisher: Publisher<u32> = Publisher::new(4);
        let rx = publisher.subscribe();
        drop(rx);
        assert!(!publisher.has_subscribers());
    }

    #[test]
    fn test_full_queue_drops_message() {
        let publisher: Publisher<u32> = Publisher::new(1);
        let rx = publisher.subscribe();
        assert_eq!(publisher.publish(1), 1);
        assert_eq!(publisher.publish(2), 0);
        assert_eq!(rx.recv().unwrap(), 1);
    }
}
