use crate::event::LifecycleEvent;
use crate::types::{EventCallback, DEFAULT_CHANNEL_CAPACITY};
use tokio::sync::broadcast;

/// Signal manager for connection lifecycle notifications.
///
/// Observers either register a synchronous callback, invoked inline on
/// every emit, or take a broadcast receiver and consume events from their
/// own task. Emitting with no observers at all is fine.
pub struct SignalManager {
    callbacks: std::sync::RwLock<Vec<EventCallback>>,
    sender: broadcast::Sender<LifecycleEvent>,
}

impl std::fmt::Debug for SignalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalManager")
            .field("callback_count", &self.callback_count())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl SignalManager {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            callbacks: std::sync::RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Add event callback
    pub fn add_callback<F>(&self, callback: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        if let Ok(mut callbacks) = self.callbacks.write() {
            callbacks.push(Box::new(callback));
        }
    }

    /// Receive events on a channel. Slow receivers lag and lose the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Emit event to all subscribers
    pub fn emit(&self, event: LifecycleEvent) {
        #[cfg(feature = "debug-logging")]
        tracing::trace!(event = %event.event_type, "emitting lifecycle event");

        if let Ok(callbacks) = self.callbacks.read() {
            for callback in callbacks.iter() {
                callback(&event);
            }
        }
        // No receivers is not an error
        let _ = self.sender.send(event);
    }

    /// Clear all callbacks
    pub fn clear_callbacks(&self) {
        if let Ok(mut callbacks) = self.callbacks.write() {
            callbacks.clear();
        }
    }

    /// Get number of registered callbacks
    pub fn callback_count(&self) -> usize {
        self.callbacks.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SignalManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn emit_without_subscribers_is_noop() {
        let signals = SignalManager::new();
        signals.emit(LifecycleEvent::ready());
        assert_eq!(signals.callback_count(), 0);
    }

    #[test]
    fn callbacks_see_every_event_in_order() {
        let signals = SignalManager::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        signals.add_callback(move |event| {
            sink.lock().unwrap().push(event.event_type);
        });

        signals.emit(LifecycleEvent::connect());
        signals.emit(LifecycleEvent::ready());
        signals.emit(LifecycleEvent::error("reset by peer"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventType::Connect, EventType::Ready, EventType::Error]
        );
    }

    #[test]
    fn clear_callbacks_detaches_observers() {
        let signals = SignalManager::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        signals.add_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        signals.emit(LifecycleEvent::close());
        signals.clear_callbacks();
        signals.emit(LifecycleEvent::close());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(signals.callback_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_subscribers_receive_events() {
        let signals = SignalManager::new();
        let mut rx = signals.subscribe();

        signals.emit(LifecycleEvent::reconnecting(3, 150));

        let event = rx.recv().await.unwrap();
        assert!(event.is(EventType::Reconnecting));
        assert_eq!(event.attempt, Some(3));
        assert_eq!(event.delay_ms, Some(150));
    }

    #[test]
    fn events_serialize_with_lowercase_type() {
        let event = LifecycleEvent::error("boom");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "error");
        assert_eq!(json["message"], "boom");
    }
}
