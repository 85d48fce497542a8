//! Client-side state stores.

pub mod notifications;

pub use notifications::{badge_label, NotificationStore, Notifications};
