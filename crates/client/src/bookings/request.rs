//! Ride booking request flow.
//!
//! ```text
//! Idle ──submit──► Submitting ──ok──► AwaitingApproval ──reset──► Idle
//!                      │
//!                      └──err──► Error ──submit──► Submitting
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use rideshare_shared::{Booking, NewBooking, ValidationError};

use crate::api_client::ApiClient;
use crate::error::{ClientError, ClientResult};

/// Shown when a submit is abandoned before the server answered.
pub const CANCELLED_MESSAGE: &str = "Booking request was cancelled";

#[derive(Debug, Clone, PartialEq)]
pub enum BookingPhase {
    Idle,
    Submitting,
    /// The booking exists and waits for the driver. Stays here until reset.
    AwaitingApproval { booking: Booking },
    Error { message: String },
}

impl BookingPhase {
    pub fn name(&self) -> &'static str {
        match self {
            BookingPhase::Idle => "idle",
            BookingPhase::Submitting => "submitting",
            BookingPhase::AwaitingApproval { .. } => "awaiting approval",
            BookingPhase::Error { .. } => "error",
        }
    }

    pub fn can_submit(&self) -> bool {
        matches!(self, BookingPhase::Idle | BookingPhase::Error { .. })
    }
}

/// One booking attempt for a ride. Clones share the same phase.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    api: ApiClient,
    phase: Arc<Mutex<BookingPhase>>,
}

impl BookingRequest {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            phase: Arc::new(Mutex::new(BookingPhase::Idle)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BookingPhase> {
        lock_phase(&self.phase)
    }

    pub fn phase(&self) -> BookingPhase {
        self.lock().clone()
    }

    pub fn can_submit(&self) -> bool {
        self.lock().can_submit()
    }

    /// Create the booking with exactly one `POST /booking`.
    ///
    /// Refused without I/O while a submit is in flight or a booking is
    /// already awaiting approval. Dropping the future before it completes
    /// leaves the flow in `Error`, from which it can submit again.
    pub async fn submit(&self, ride_id: &str, message: Option<String>) -> ClientResult<Booking> {
        let ride_id = ride_id.trim();
        let in_flight = {
            let mut phase = self.lock();
            if !phase.can_submit() {
                return Err(ClientError::InvalidTransition {
                    action: "submit a booking",
                    state: phase.name(),
                });
            }
            if ride_id.is_empty() {
                return Err(ValidationError::new("rideId", "Choose a ride to book").into());
            }
            *phase = BookingPhase::Submitting;
            InFlight::new(&self.phase)
        };

        let request = NewBooking {
            ride_id: ride_id.to_string(),
            message: message.filter(|m| !m.trim().is_empty()),
        };

        match self.api.create_booking(&request).await {
            Ok(booking) => {
                tracing::info!(booking_id = %booking.id, %ride_id, "booking requested");
                in_flight.finish(BookingPhase::AwaitingApproval {
                    booking: booking.clone(),
                });
                Ok(booking)
            }
            Err(e) => {
                tracing::error!(%ride_id, error = %e, "booking request failed");
                in_flight.finish(BookingPhase::Error {
                    message: e.user_message(),
                });
                Err(e.into())
            }
        }
    }

    /// Return to `Idle`. Not allowed while a submit is in flight.
    pub fn reset(&self) -> ClientResult<()> {
        let mut phase = self.lock();
        if *phase == BookingPhase::Submitting {
            return Err(ClientError::InvalidTransition {
                action: "reset",
                state: phase.name(),
            });
        }
        *phase = BookingPhase::Idle;
        Ok(())
    }
}

fn lock_phase(phase: &Mutex<BookingPhase>) -> MutexGuard<'_, BookingPhase> {
    phase.lock().unwrap_or_else(|e| e.into_inner())
}

/// Holds the flow in `Submitting` until [`finish`](Self::finish) is called.
/// Dropped unfinished, it moves the flow to `Error`.
struct InFlight<'a> {
    phase: &'a Mutex<BookingPhase>,
    done: bool,
}

impl<'a> InFlight<'a> {
    fn new(phase: &'a Mutex<BookingPhase>) -> Self {
        Self { phase, done: false }
    }

    fn finish(mut self, next: BookingPhase) {
        *lock_phase(self.phase) = next;
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut phase = lock_phase(self.phase);
        if *phase == BookingPhase::Submitting {
            tracing::warn!("booking request cancelled before completion");
            *phase = BookingPhase::Error {
                message: CANCELLED_MESSAGE.to_string(),
            };
        }
    }
}
