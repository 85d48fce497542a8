//! Notification center: the operations a notification panel performs.
//!
//! Every mutation calls the API first and touches the store only after the
//! server accepted it. Answering a booking request is two separate steps:
//! the dispatcher call, then the configured [`ResponsePolicy`].

use std::str::FromStr;

use rideshare_shared::{Acknowledgement, NotificationKind, NotificationQuery, ValidationError};
use tokio::sync::oneshot;

use crate::api_client::ApiClient;
use crate::bookings::{BookingActions, Decision};
use crate::error::{ClientError, ClientResult};
use crate::stores::Notifications;
use crate::tasks::TaskScope;

/// What happens to a booking-request notification once it was answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponsePolicy {
    /// Mark it read on the server and in the store.
    #[default]
    MarkRead,
    /// Delete it on the server and from the store.
    Remove,
    /// Leave it untouched.
    Leave,
}

impl ResponsePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponsePolicy::MarkRead => "mark_read",
            ResponsePolicy::Remove => "remove",
            ResponsePolicy::Leave => "leave",
        }
    }
}

impl FromStr for ResponsePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "mark_read" | "read" => Ok(ResponsePolicy::MarkRead),
            "remove" | "delete" => Ok(ResponsePolicy::Remove),
            "leave" | "none" => Ok(ResponsePolicy::Leave),
            other => Err(format!("unknown response policy: {other}")),
        }
    }
}

/// Result of answering a booking request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseOutcome {
    pub notification_id: String,
    pub booking_id: String,
    pub decision: Decision,
    pub acknowledgement: Acknowledgement,
    pub policy: ResponsePolicy,
    /// Whether the policy step changed the store.
    pub store_changed: bool,
    /// Set when the decision went through but the policy step failed.
    pub policy_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NotificationCenter {
    api: ApiClient,
    store: Notifications,
    actions: BookingActions,
    policy: ResponsePolicy,
}

impl NotificationCenter {
    pub fn new(api: ApiClient, store: Notifications) -> Self {
        Self {
            actions: BookingActions::new(api.clone()),
            api,
            store,
            policy: ResponsePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ResponsePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ResponsePolicy {
        self.policy
    }

    pub fn store(&self) -> &Notifications {
        &self.store
    }

    /// Seed the store from `GET /notification/my`. Returns the new length.
    pub async fn load(&self) -> ClientResult<usize> {
        let list = self.api.my_notifications(&NotificationQuery::default()).await?;
        let count = list.len();
        self.store.replace_all(list);
        tracing::info!(count, unread = self.store.unread_count(), "notifications loaded");
        Ok(self.store.len())
    }

    pub async fn mark_read(&self, notification_id: &str) -> ClientResult<bool> {
        self.api.mark_notification_read(notification_id).await.map_err(|e| {
            tracing::error!(%notification_id, error = %e, "mark read failed");
            e
        })?;
        Ok(self.store.mark_read(notification_id))
    }

    pub async fn mark_all_read(&self) -> ClientResult<usize> {
        self.api.mark_all_notifications_read().await.map_err(|e| {
            tracing::error!(error = %e, "mark all read failed");
            e
        })?;
        Ok(self.store.mark_all_read())
    }

    pub async fn delete(&self, notification_id: &str) -> ClientResult<bool> {
        self.api.delete_notification(notification_id).await.map_err(|e| {
            tracing::error!(%notification_id, error = %e, "delete failed");
            e
        })?;
        Ok(self.store.delete(notification_id))
    }

    /// Approve or reject the booking behind a booking-request notification,
    /// then apply the response policy.
    ///
    /// If the decision fails the store is left as it was.
    pub async fn respond(&self, notification_id: &str, decision: Decision) -> ClientResult<ResponseOutcome> {
        let notification = self
            .store
            .get(notification_id)
            .ok_or_else(|| ClientError::UnknownNotification(notification_id.to_string()))?;

        if notification.kind != NotificationKind::BookingRequest {
            return Err(ValidationError::new(
                "type",
                format!("{} notifications cannot be answered", notification.kind.as_str()),
            )
            .into());
        }

        let booking_id = notification
            .booking_id()
            .ok_or_else(|| ValidationError::new("bookingId", "Booking id is missing"))?
            .to_string();

        let acknowledgement = self.actions.decide(&booking_id, decision).await?;

        let mut outcome = ResponseOutcome {
            notification_id: notification_id.to_string(),
            booking_id,
            decision,
            acknowledgement,
            policy: self.policy,
            store_changed: false,
            policy_error: None,
        };

        let applied = match self.policy {
            ResponsePolicy::MarkRead if notification.is_read => Ok(false),
            ResponsePolicy::MarkRead => self.mark_read(notification_id).await,
            ResponsePolicy::Remove => self.delete(notification_id).await,
            ResponsePolicy::Leave => Ok(false),
        };

        match applied {
            Ok(changed) => outcome.store_changed = changed,
            Err(e) => {
                tracing::warn!(
                    %notification_id,
                    policy = self.policy.as_str(),
                    error = %e,
                    "decision sent but response policy failed"
                );
                outcome.policy_error = Some(e.user_message());
            }
        }

        Ok(outcome)
    }

    /// [`respond`](Self::respond) as a task owned by `scope`. If the scope
    /// is dropped first the task is aborted and the receiver sees an error.
    pub fn respond_in(
        &self,
        scope: &TaskScope,
        notification_id: &str,
        decision: Decision,
    ) -> oneshot::Receiver<ClientResult<ResponseOutcome>> {
        let (tx, rx) = oneshot::channel();
        let center = self.clone();
        let notification_id = notification_id.to_string();
        scope.spawn(async move {
            let result = center.respond(&notification_id, decision).await;
            let _ = tx.send(result);
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_config_values() {
        assert_eq!("mark_read".parse::<ResponsePolicy>(), Ok(ResponsePolicy::MarkRead));
        assert_eq!("Mark-Read".parse::<ResponsePolicy>(), Ok(ResponsePolicy::MarkRead));
        assert_eq!("remove".parse::<ResponsePolicy>(), Ok(ResponsePolicy::Remove));
        assert_eq!("leave".parse::<ResponsePolicy>(), Ok(ResponsePolicy::Leave));
        assert!("archive".parse::<ResponsePolicy>().is_err());
        assert_eq!(ResponsePolicy::default(), ResponsePolicy::MarkRead);
    }

    #[tokio::test]
    async fn unknown_notification_fails_before_io() {
        let center = NotificationCenter::new(
            ApiClient::new().with_base_url("http://127.0.0.1:9/api"),
            Notifications::new(),
        );
        let err = center.respond("missing", Decision::Approve).await.unwrap_err();
        assert!(matches!(err, ClientError::UnknownNotification(id) if id == "missing"));
    }
}
