//! Booking approval and booking request flows.

pub mod actions;
pub mod request;

pub use actions::{BookingActions, Decision};
pub use request::{BookingPhase, BookingRequest};
