//! Realtime notification channel.
//!
//! ```text
//!  RealtimeManager::init(user_id) ──► Subscription ─┐
//!          │                                        │ recv(): RealtimeEvent
//!          ▼                                        │
//!  RealtimeConnection (one tokio task per user) ────┤
//!          │ notification event                     │
//!          ▼                                        │
//!  Notifications store (add, dedup by id) ──────────┘
//! ```
//!
//! Views read from the notification store; subscriptions carry the same
//! events plus toasts for booking outcomes.

mod connection;
mod manager;

pub use connection::{ConnectionState, ReconnectConfig, RealtimeHandle};
pub use manager::{RealtimeEvent, RealtimeManager, Subscription};
