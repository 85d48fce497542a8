//! HTTP API client for the rideshare backend.
//!
//! Every request carries the session token in the `x-auth-token` header when
//! one is configured.

use reqwest::{Client, RequestBuilder};
use rideshare_shared::rides::RideSearch;
use rideshare_shared::{
    Acknowledgement, ApiError, AuthEnvelope, Booking, Chat, ChatInitiateRequest,
    ChatMessageRequest, ItemEnvelope, ListEnvelope, LoginRequest, NewBooking, NewRide,
    Notification, NotificationQuery, RegisterRequest, Ride, Session, UpdateProfileRequest, User,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ClientResult;

/// Header carrying the session token.
pub const AUTH_HEADER: &str = "x-auth-token";

/// HTTP client for the rideshare REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

impl ApiClient {
    /// Create a new API client
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
            token: None,
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the session token sent with every request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    fn authorize(&self, rb: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => rb.header(AUTH_HEADER, token),
            None => rb,
        }
    }

    async fn execute<TRes: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<TRes, ApiError> {
        let resp = self
            .authorize(rb)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            tracing::debug!(status, body = %text, "request rejected");
            return Err(ApiError::Http { status, body: text });
        }

        if text.trim().is_empty() {
            serde_json::from_str("null").map_err(|e| ApiError::Deserialize(e.to_string()))
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
        }
    }

    fn with_json<TReq: Serialize>(rb: RequestBuilder, body: &TReq) -> Result<RequestBuilder, ApiError> {
        let body_bytes = serde_json::to_vec(body).map_err(|e| ApiError::Deserialize(e.to_string()))?;
        Ok(rb.body(body_bytes).header("Content-Type", "application/json"))
    }

    /// Make a GET request
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        tracing::debug!(path, "GET");
        self.execute(self.client.get(self.url(path))).await
    }

    /// Make a GET request with query parameters
    pub async fn get_json_with_query<TQuery: Serialize + ?Sized, TRes: DeserializeOwned>(
        &self,
        path: &str,
        query: &TQuery,
    ) -> Result<TRes, ApiError> {
        tracing::debug!(path, "GET");
        self.execute(self.client.get(self.url(path)).query(query)).await
    }

    /// Make a POST request with JSON body
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        tracing::debug!(path, "POST");
        let rb = Self::with_json(self.client.post(self.url(path)), body)?;
        self.execute(rb).await
    }

    /// Make a PUT request with JSON body
    pub async fn put_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        tracing::debug!(path, "PUT");
        let rb = Self::with_json(self.client.put(self.url(path)), body)?;
        self.execute(rb).await
    }

    /// Make a PATCH request with JSON body
    pub async fn patch_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        tracing::debug!(path, "PATCH");
        let rb = Self::with_json(self.client.patch(self.url(path)), body)?;
        self.execute(rb).await
    }

    /// Make a DELETE request
    pub async fn delete_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        tracing::debug!(path, "DELETE");
        self.execute(self.client.delete(self.url(path))).await
    }

    /// Mutation endpoints answer with `{ message }`, an empty body, or the
    /// updated record; all of them count as an acknowledgement.
    async fn acknowledged(
        &self,
        fut: impl std::future::Future<Output = Result<Option<serde_json::Value>, ApiError>>,
    ) -> Result<Acknowledgement, ApiError> {
        let value = fut.await?;
        let message = value
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string);
        Ok(Acknowledgement { message })
    }

    // --- Rides ---

    /// Search published rides. Fails without I/O when the search has neither
    /// origin nor destination.
    pub async fn search_rides(&self, search: &RideSearch) -> ClientResult<Vec<Ride>> {
        let query = search.to_query()?;
        let rides: ListEnvelope<Ride> = self.get_json_with_query("/Ride/search", &query).await?;
        Ok(rides.into_vec())
    }

    pub async fn get_ride(&self, ride_id: &str) -> Result<Ride, ApiError> {
        let ride: ItemEnvelope<Ride> = self.get_json(&format!("/rides/{}", segment(ride_id))).await?;
        Ok(ride.into_inner())
    }

    pub async fn create_ride(&self, ride: &NewRide) -> Result<Acknowledgement, ApiError> {
        self.acknowledged(self.post_json("/Ride/Ride", ride)).await
    }

    pub async fn update_ride(
        &self,
        ride_id: &str,
        updates: &serde_json::Value,
    ) -> Result<Acknowledgement, ApiError> {
        self.acknowledged(self.patch_json(&format!("/rides/{}", segment(ride_id)), updates))
            .await
    }

    pub async fn delete_ride(&self, ride_id: &str) -> Result<Acknowledgement, ApiError> {
        self.acknowledged(self.delete_json(&format!("/rides/{}", segment(ride_id))))
            .await
    }

    /// Rides published by the signed-in driver
    pub async fn my_rides(&self) -> Result<Vec<Ride>, ApiError> {
        let rides: ListEnvelope<Ride> = self.get_json("/ride/my").await?;
        Ok(rides.into_vec())
    }

    // --- Bookings ---

    pub async fn create_booking(&self, booking: &NewBooking) -> Result<Booking, ApiError> {
        let created: ItemEnvelope<Booking> = self.post_json("/booking", booking).await?;
        Ok(created.into_inner())
    }

    pub async fn my_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        let bookings: ListEnvelope<Booking> = self.get_json("/booking/my").await?;
        Ok(bookings.into_vec())
    }

    pub async fn approve_booking(&self, booking_id: &str) -> Result<Acknowledgement, ApiError> {
        let path = format!("/booking/{}/approve", segment(booking_id));
        self.acknowledged(self.put_json(&path, &serde_json::json!({}))).await
    }

    pub async fn reject_booking(&self, booking_id: &str) -> Result<Acknowledgement, ApiError> {
        let path = format!("/booking/{}/reject", segment(booking_id));
        self.acknowledged(self.put_json(&path, &serde_json::json!({}))).await
    }

    // --- Notifications ---

    pub async fn my_notifications(&self, query: &NotificationQuery) -> Result<Vec<Notification>, ApiError> {
        let list: ListEnvelope<Notification> =
            self.get_json_with_query("/notification/my", query).await?;
        Ok(list.into_vec())
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<Acknowledgement, ApiError> {
        let path = format!("/notification/{}/read", segment(notification_id));
        self.acknowledged(self.put_json(&path, &serde_json::json!({}))).await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<Acknowledgement, ApiError> {
        self.acknowledged(self.put_json("/notification/read-all", &serde_json::json!({})))
            .await
    }

    pub async fn delete_notification(&self, notification_id: &str) -> Result<Acknowledgement, ApiError> {
        let path = format!("/notification/{}", segment(notification_id));
        self.acknowledged(self.delete_json(&path)).await
    }

    // --- Chat ---

    /// Log that a rider opened a conversation with a driver
    pub async fn initiate_chat(&self, request: &ChatInitiateRequest) -> Result<Acknowledgement, ApiError> {
        self.acknowledged(self.post_json("/chats/initiate", request)).await
    }

    pub async fn my_chats(&self) -> Result<Vec<Chat>, ApiError> {
        let chats: ListEnvelope<Chat> = self.get_json("/chats/my").await?;
        Ok(chats.into_vec())
    }

    pub async fn chat_for_ride(&self, ride_id: &str) -> Result<Chat, ApiError> {
        let chat: ItemEnvelope<Chat> = self
            .get_json(&format!("/chats/ride/{}", segment(ride_id)))
            .await?;
        Ok(chat.into_inner())
    }

    pub async fn send_chat_message(&self, message: &ChatMessageRequest) -> Result<Acknowledgement, ApiError> {
        self.acknowledged(self.post_json("/chats/message", message)).await
    }

    pub async fn mark_chat_read(&self, chat_id: &str) -> Result<Acknowledgement, ApiError> {
        let path = format!("/chats/{}/read", segment(chat_id));
        self.acknowledged(self.put_json(&path, &serde_json::json!({}))).await
    }

    // --- Users ---

    pub async fn login(&self, credentials: &LoginRequest) -> Result<Session, ApiError> {
        let envelope: AuthEnvelope = self.post_json("/user/login", credentials).await?;
        Ok(envelope.data)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<Acknowledgement, ApiError> {
        self.acknowledged(self.post_json("/user/register", request)).await
    }

    pub async fn profile(&self) -> Result<User, ApiError> {
        let user: ItemEnvelope<User> = self.get_json("/user/profile").await?;
        Ok(user.into_inner())
    }

    pub async fn update_profile(&self, update: &UpdateProfileRequest) -> Result<Acknowledgement, ApiError> {
        self.acknowledged(self.put_json("/user/update", update)).await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}
