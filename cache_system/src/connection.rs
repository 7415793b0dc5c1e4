//! Connection state machine and reconnect supervision
//!
//! The connection state changes only in response to lifecycle events
//! (connect, ready, error, close, reconnecting). Every event is applied to
//! the state first and then forwarded to the signal manager's observers.

use crate::backend::CacheBackend;
use config::CacheConfig;
use serde::Serialize;
use signal_system::{EventType, LifecycleEvent, SignalManager};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

/// Link state to the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    /// State after `event` is observed in `self`
    pub fn on_event(self, event: EventType) -> ConnectionState {
        match (self, event) {
            (_, EventType::Connect) => ConnectionState::Connected,
            // Ready confirms a link in progress; it never revives a dropped one
            (ConnectionState::Connecting | ConnectionState::Connected, EventType::Ready) => {
                ConnectionState::Connected
            }
            (state, EventType::Ready) => state,
            (_, EventType::Close) => ConnectionState::Closed,
            // Nothing revives a closed link except a fresh connect
            (ConnectionState::Closed, _) => ConnectionState::Closed,
            (_, EventType::Error) => ConnectionState::Disconnected,
            (_, EventType::Reconnecting) => ConnectionState::Reconnecting,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Owns the connection state and the reconnect loop
#[derive(Debug)]
pub struct ConnectionSupervisor {
    state: RwLock<ConnectionState>,
    signals: Arc<SignalManager>,
    reconnecting: AtomicBool,
}

impl ConnectionSupervisor {
    pub fn new(signals: Arc<SignalManager>) -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            signals,
            reconnecting: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
            .read()
            .map(|state| *state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn signals(&self) -> &Arc<SignalManager> {
        &self.signals
    }

    /// Mark a `connect()` call in flight
    pub(crate) fn begin_connect(&self) {
        self.set_state(ConnectionState::Connecting);
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        *state = next;
    }

    /// Apply a lifecycle event and notify observers
    pub fn handle(&self, event: LifecycleEvent) {
        {
            let mut state = match self.state.write() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            *state = state.on_event(event.event_type);
        }

        match event.event_type {
            EventType::Connect => debug!("Cache connection established"),
            EventType::Ready => info!("Cache ready"),
            EventType::Error => error!(
                error = event.message.as_deref().unwrap_or("unknown"),
                "Cache connection error"
            ),
            EventType::Close => info!("Cache connection closed"),
            EventType::Reconnecting => warn!(
                attempt = event.attempt.unwrap_or_default(),
                delay_ms = event.delay_ms.unwrap_or_default(),
                "Reconnecting to cache"
            ),
        }

        self.signals.emit(event);
    }

    /// Emit `connect` and, unless an error landed in between, `ready`.
    /// Returns whether the link ended up connected.
    pub(crate) fn mark_connected(&self) -> bool {
        self.handle(LifecycleEvent::connect());
        if !self.is_connected() {
            return false;
        }
        self.handle(LifecycleEvent::ready());
        self.is_connected()
    }

    /// Start the background reconnect loop unless one is already running.
    ///
    /// Attempts repeat indefinitely with `min(attempt * step, ceiling)` delay
    /// until the backend opens again or the connection is closed.
    pub fn spawn_reconnect(
        self: &Arc<Self>,
        backend: Arc<dyn CacheBackend>,
        config: Arc<CacheConfig>,
    ) {
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            supervisor.reconnect_loop(backend, config).await;
        });
    }

    /// Runs until the backend reopens or the link is closed. The
    /// single-flight flag is released before `connect`/`ready` are emitted,
    /// so an error raised by their observers can start a fresh loop.
    async fn reconnect_loop(&self, backend: Arc<dyn CacheBackend>, config: Arc<CacheConfig>) {
        let mut attempt: u32 = 0;
        loop {
            if self.state() == ConnectionState::Closed {
                self.reconnecting.store(false, Ordering::SeqCst);
                return;
            }

            attempt = attempt.saturating_add(1);
            let delay = config.retry_delay(attempt);
            self.handle(LifecycleEvent::reconnecting(
                attempt,
                delay.as_millis() as u64,
            ));
            tokio::time::sleep(delay).await;

            if self.state() == ConnectionState::Closed {
                self.reconnecting.store(false, Ordering::SeqCst);
                return;
            }

            match backend.open().await {
                Ok(()) => {
                    self.reconnecting.store(false, Ordering::SeqCst);
                    // disconnect() may have raced the open
                    if self.state() == ConnectionState::Closed {
                        backend.close().await;
                        return;
                    }
                    self.mark_connected();
                    return;
                }
                Err(err) => self.handle(LifecycleEvent::error(err.to_string())),
            }
        }
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::SeqCst)
    }
}
