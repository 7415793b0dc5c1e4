//! Signal system for connection lifecycle handling
//!
//! This crate delivers cache connection lifecycle events (connect, ready,
//! error, close, reconnecting) to synchronous callbacks and async
//! broadcast subscribers.

pub mod event;
pub mod manager;
pub mod prelude;
pub mod types;

pub use event::{EventType, LifecycleEvent};
pub use manager::SignalManager;
pub use types::{EventCallback, DEFAULT_CHANNEL_CAPACITY};
