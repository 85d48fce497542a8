//! Approve/reject dispatcher for booking requests.
//!
//! Only issues the HTTP call. Whatever should happen to the notification
//! afterwards is decided by the caller (see [`crate::center`]).

use rideshare_shared::{Acknowledgement, ValidationError};

use crate::api_client::ApiClient;
use crate::error::ClientResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingActions {
    api: ApiClient,
}

impl BookingActions {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn approve(&self, booking_id: &str) -> ClientResult<Acknowledgement> {
        self.decide(booking_id, Decision::Approve).await
    }

    pub async fn reject(&self, booking_id: &str) -> ClientResult<Acknowledgement> {
        self.decide(booking_id, Decision::Reject).await
    }

    /// Send one decision. Failures are logged and returned, never retried.
    pub async fn decide(&self, booking_id: &str, decision: Decision) -> ClientResult<Acknowledgement> {
        let booking_id = booking_id.trim();
        if booking_id.is_empty() {
            return Err(ValidationError::new("bookingId", "Booking id is missing").into());
        }

        let result = match decision {
            Decision::Approve => self.api.approve_booking(booking_id).await,
            Decision::Reject => self.api.reject_booking(booking_id).await,
        };

        match result {
            Ok(ack) => {
                tracing::info!(%booking_id, decision = decision.as_str(), "booking decision sent");
                Ok(ack)
            }
            Err(e) => {
                tracing::error!(
                    %booking_id,
                    decision = decision.as_str(),
                    status = ?e.status(),
                    error = %e,
                    "booking decision failed"
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[tokio::test]
    async fn blank_booking_id_fails_before_io() {
        // No server behind this address; reaching the network would fail differently.
        let actions = BookingActions::new(ApiClient::new().with_base_url("http://127.0.0.1:9/api"));
        let err = actions.approve("  ").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(ref v) if v.field == "bookingId"));
    }
}
