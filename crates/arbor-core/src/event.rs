//! Change notification for the arbor explorer
//!
//! Caches and registries publish events on a shared bus; columns and the
//! render engine subscribe independently. Delivery is fire-and-forget:
//! publishing with no subscribers is not an error, and a slow subscriber
//! only loses its own backlog.

use std::path::PathBuf;
use tokio::sync::broadcast;

/// Events published by caches and registries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Git status cache finished a refresh and swapped its path map
    GitRefreshed,
    /// Buffer registry completed a reload of its tracked set
    BufferReload,
    /// A tracked buffer's modified flag changed
    BufferModified {
        /// Normalized full path of the buffer
        path: PathBuf,
        /// New value of the modified flag
        modified: bool,
    },
    /// Settings were reloaded; templates must be re-parsed
    SettingsChanged,
}

/// Broadcast bus for cache change notification
///
/// The `EventBus` fans each published event out to every live subscriber.
/// It wraps tokio's broadcast channel, so subscribers that lag beyond the
/// buffer capacity drop old events instead of applying back-pressure.
///
/// # Example
///
/// ```
/// use arbor_core::event::{Event, EventBus};
///
/// let bus = EventBus::new(64);
/// let mut rx = bus.subscribe();
/// let delivered = bus.publish(Event::GitRefreshed);
/// assert_eq!(delivered, 1);
/// ```
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new bus with the given per-subscriber buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventBus { sender }
    }

    /// Subscribe to all events published after this call
    ///
    /// Dropping the returned receiver ends the subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers the event reached. Zero
    /// subscribers is not an error.
    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(256)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        EventBus {
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(Event::GitRefreshed), 0);
    }

    #[test]
    fn test_subscriber_count() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_drop_ends_subscription() {
        let bus = EventBus::new(16);
        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let delivered = bus.publish(Event::BufferReload);
        assert_eq!(delivered, 1);

        let event = rx.recv().await.expect("should receive event");
        assert_eq!(event, Event::BufferReload);
    }

    #[tokio::test]
    async fn test_fan_out_to_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let delivered = bus.publish(Event::SettingsChanged);
        assert_eq!(delivered, 2);

        assert_eq!(rx1.recv().await.unwrap(), Event::SettingsChanged);
        assert_eq!(rx2.recv().await.unwrap(), Event::SettingsChanged);
    }

    #[tokio::test]
    async fn test_clone_shares_channel() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let bus2 = bus.clone();

        bus2.publish(Event::BufferModified {
            path: PathBuf::from("/tmp/a.txt"),
            modified: true,
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::BufferModified { modified: true, .. }));
    }

    #[tokio::test]
    async fn test_subscribe_misses_earlier_events() {
        let bus = EventBus::new(16);
        let _sink = bus.subscribe();
        bus.publish(Event::GitRefreshed);

        let mut late = bus.subscribe();
        bus.publish(Event::BufferReload);
        assert_eq!(late.recv().await.unwrap(), Event::BufferReload);
    }
}
