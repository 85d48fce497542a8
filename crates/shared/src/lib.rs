//! Shared types and utilities for the rideshare client and its tests.

pub mod error;
pub mod location;
pub mod models;
pub mod protocol;
pub mod rides;

pub use error::*;
pub use models::*;
pub use protocol::*;
