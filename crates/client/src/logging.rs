//! Logging setup.
//!
//! The library only emits `tracing` events; binaries call [`init`] once to
//! install a subscriber. `RUST_LOG` overrides the default filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "rideshare_client=debug,rideshare_watch=debug";

/// Install a formatting subscriber filtered by `RUST_LOG` (or `default_filter`).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(default_filter: &str) -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
