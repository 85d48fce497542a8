//! Rideshare Client - notification and booking core
//!
//! This crate contains the client side of the rideshare app: the REST API
//! client, the realtime notification channel, the notification store, and
//! the booking approval and booking request flows.

pub mod api_client;
pub mod auth_session;
pub mod bookings;
pub mod center;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod storage;
pub mod stores;
pub mod tasks;
pub mod ws;

pub use api_client::ApiClient;
pub use auth_session::SessionManager;
pub use bookings::{BookingActions, BookingPhase, BookingRequest, Decision};
pub use center::{NotificationCenter, ResponseOutcome, ResponsePolicy};
pub use config::{ClientConfig, ConnectionSettings};
pub use error::{ClientError, ClientResult, RealtimeError, StorageError};
pub use storage::FileStore;
pub use stores::Notifications;
pub use tasks::TaskScope;
pub use ws::{ConnectionState, RealtimeEvent, RealtimeManager, Subscription};
