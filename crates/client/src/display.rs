//! Presentation metadata for notifications.

use rideshare_shared::{Notification, NotificationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Car,
    Check,
    Cross,
    Chat,
    Route,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Danger,
    Neutral,
    Accent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMeta {
    pub icon: Icon,
    pub tone: Tone,
    pub label: &'static str,
}

/// Icon, tone and label for a notification kind.
pub fn display_meta(kind: NotificationKind) -> DisplayMeta {
    let (icon, tone, label) = match kind {
        NotificationKind::BookingRequest => (Icon::Car, Tone::Info, "Booking request"),
        NotificationKind::BookingApproved => (Icon::Check, Tone::Success, "Booking approved"),
        NotificationKind::BookingRejected => (Icon::Cross, Tone::Danger, "Booking rejected"),
        NotificationKind::Message => (Icon::Chat, Tone::Neutral, "Message"),
        NotificationKind::RideUpdate => (Icon::Route, Tone::Accent, "Ride update"),
    };
    DisplayMeta { icon, tone, label }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

/// Non-blocking popup raised for a pushed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub text: String,
    pub notification_id: String,
}

/// Toast for a pushed notification. Only booking outcomes raise one.
pub fn toast_for(notification: &Notification) -> Option<Toast> {
    let (level, text) = match notification.kind {
        NotificationKind::BookingApproved => (ToastLevel::Success, "Your ride has been approved!"),
        NotificationKind::BookingRejected => (ToastLevel::Error, "Your ride request was rejected."),
        NotificationKind::BookingRequest | NotificationKind::Message | NotificationKind::RideUpdate => {
            return None
        }
    };
    Some(Toast {
        level,
        text: text.to_string(),
        notification_id: notification.id.clone(),
    })
}
