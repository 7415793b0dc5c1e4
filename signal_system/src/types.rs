//! Type definitions for signal system

use crate::event::LifecycleEvent;

/// Synchronous lifecycle observer
pub type EventCallback = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Capacity of the broadcast channel handed to async subscribers
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
