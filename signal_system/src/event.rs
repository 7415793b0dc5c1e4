//! Connection lifecycle event types
//!
//! This module defines the lifecycle events a cache connection goes
//! through and that flow through the signal system to observers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Socket to the backing store opened
    Connect,
    /// Connection usable for commands
    Ready,
    /// Connection failed or dropped
    Error,
    /// Connection closed for good
    Close,
    /// A reconnect attempt is scheduled
    Reconnecting,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Connect => "connect",
            EventType::Ready => "ready",
            EventType::Error => "error",
            EventType::Close => "close",
            EventType::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Event type
    pub event_type: EventType,
    /// Error text or other human-readable detail
    pub message: Option<String>,
    /// Reconnect attempt number (1-based), set on `Reconnecting`
    pub attempt: Option<u32>,
    /// Delay before the reconnect attempt, set on `Reconnecting`
    pub delay_ms: Option<u64>,
    /// Event timestamp (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl LifecycleEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            message: None,
            attempt: None,
            delay_ms: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn connect() -> Self {
        Self::new(EventType::Connect)
    }

    pub fn ready() -> Self {
        Self::new(EventType::Ready)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventType::Error).with_message(message)
    }

    pub fn close() -> Self {
        Self::new(EventType::Close)
    }

    pub fn reconnecting(attempt: u32, delay_ms: u64) -> Self {
        Self::new(EventType::Reconnecting).with_attempt(attempt, delay_ms)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_attempt(mut self, attempt: u32, delay_ms: u64) -> Self {
        self.attempt = Some(attempt);
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn is(&self, event_type: EventType) -> bool {
        self.event_type == event_type
    }
}
