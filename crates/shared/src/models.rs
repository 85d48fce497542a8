//! Wire models for the rideshare REST and realtime APIs.
//!
//! The backend is MongoDB-backed, so records carry `_id`. Every model accepts
//! `id` as well on input and emits `_id` on output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// --- Users & sessions ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<String>,
}

impl User {
    pub fn is_verified(&self) -> bool {
        self.verification_status.as_deref() == Some("verified")
    }

    /// Merge a partial profile update into this user.
    pub fn apply_update(&mut self, update: &UpdateProfileRequest) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(email) = &update.email {
            self.email = Some(email.clone());
        }
        if let Some(phone) = &update.phone {
            self.phone = Some(phone.clone());
        }
    }
}

/// A reference to a user that the backend may or may not have populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum UserRef {
    Populated(User),
    Id(String),
}

impl UserRef {
    pub fn id(&self) -> &str {
        match self {
            UserRef::Populated(user) => &user.id,
            UserRef::Id(id) => id,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            UserRef::Populated(user) => Some(user),
            UserRef::Id(_) => None,
        }
    }
}

/// An authenticated session: the logged-in user and the token sent as `x-auth-token`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Body of a successful login: `{ message, data: { token, user } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthEnvelope {
    #[serde(default)]
    pub message: Option<String>,
    pub data: Session,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Generic `{ message }` acknowledgement returned by mutation endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Acknowledgement {
    #[serde(default)]
    pub message: Option<String>,
}

// --- Locations ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// GeoJSON point. Coordinates are `[lng, lat]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    #[serde(rename = "type", default = "GeoPoint::point_type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    fn point_type() -> String {
        "Point".to_string()
    }

    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            kind: Self::point_type(),
            coordinates: [coordinates.lng, coordinates.lat],
        }
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn to_coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat(),
            lng: self.lng(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Place {
    pub name: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub name: String,
    pub location: GeoPoint,
    /// Position along the route, starting at 1.
    pub route_index: u32,
}

// --- Rides ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Car,
    Bike,
}

fn year_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Year {
        Number(u16),
        Text(String),
    }

    match Option::<Year>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Year::Number(year)) => Ok(Some(year)),
        Some(Year::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Year::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInfo {
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub plate_number: String,
    #[serde(default, deserialize_with = "year_from_number_or_string")]
    pub year: Option<u16>,
    #[serde(default)]
    pub color: String,
    #[serde(
        default,
        alias = "VechileType",
        skip_serializing_if = "Option::is_none"
    )]
    pub vehicle_type: Option<VehicleType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub origin: Place,
    pub destination: Place,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stops: Vec<Stop>,
    pub date_time: DateTime<Utc>,
    pub available_seats: u32,
    pub price_per_seat: f64,
    pub driver_id: UserRef,
    #[serde(default, alias = "vechileInfo", skip_serializing_if = "Option::is_none")]
    pub vehicle_info: Option<VehicleInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `POST /Ride/Ride`. Build one through [`crate::rides::RideDraft`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewRide {
    pub origin: Place,
    pub destination: Place,
    pub stops: Vec<Stop>,
    pub date_time: DateTime<Utc>,
    pub available_seats: u32,
    pub price_per_seat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub vehicle_info: VehicleInfo,
}

/// A ride reference that may or may not be populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RideRef {
    Populated(Box<Ride>),
    Id(String),
}

impl RideRef {
    pub fn id(&self) -> &str {
        match self {
            RideRef::Populated(ride) => &ride.id,
            RideRef::Id(id) => id,
        }
    }
}

// --- Bookings ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub ride_id: RideRef,
    pub rider_id: UserRef,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub ride_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// --- Notifications ---

/// The kinds of notification the backend pushes.
///
/// Unknown kinds fail to deserialize instead of falling back to a default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingRequest,
    BookingApproved,
    BookingRejected,
    Message,
    RideUpdate,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 5] = [
        NotificationKind::BookingRequest,
        NotificationKind::BookingApproved,
        NotificationKind::BookingRejected,
        NotificationKind::Message,
        NotificationKind::RideUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingRequest => "booking_request",
            NotificationKind::BookingApproved => "booking_approved",
            NotificationKind::BookingRejected => "booking_rejected",
            NotificationKind::Message => "message",
            NotificationKind::RideUpdate => "ride_update",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ride_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: NotificationData,
}

impl Notification {
    pub fn booking_id(&self) -> Option<&str> {
        self.data
            .booking_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }
}

/// Query parameters for `GET /notification/my`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_only: Option<bool>,
}

// --- Chat ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatInitiateRequest {
    pub ride_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub initiated_at: DateTime<Utc>,
    #[serde(rename = "timeStamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    pub chat_id: String,
    pub content: String,
    pub message_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserRef>,
    #[serde(default)]
    pub content: String,
    #[serde(default = "ChatMessage::text_type")]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    fn text_type() -> String {
        "text".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ride_id: Option<RideRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub participants: Vec<UserRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<ChatMessage>,
}

// --- Response envelopes ---

/// List endpoints answer either with a bare array or with the array wrapped
/// under a resource-specific key.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    Bare(Vec<T>),
    Wrapped(WrappedList<T>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WrappedList<T> {
    #[serde(
        alias = "notifications",
        alias = "rides",
        alias = "bookings",
        alias = "chats"
    )]
    pub data: Vec<T>,
}

impl<T> ListEnvelope<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListEnvelope::Bare(items) => items,
            ListEnvelope::Wrapped(wrapped) => wrapped.data,
        }
    }
}

/// Single-record endpoints answer either with the record or with it wrapped.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ItemEnvelope<T> {
    Wrapped(WrappedItem<T>),
    Bare(T),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WrappedItem<T> {
    #[serde(
        alias = "ride",
        alias = "booking",
        alias = "user",
        alias = "chat",
        alias = "notification"
    )]
    pub data: T,
}

impl<T> ItemEnvelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            ItemEnvelope::Wrapped(wrapped) => wrapped.data,
            ItemEnvelope::Bare(item) => item,
        }
    }
}
