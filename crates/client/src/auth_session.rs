//! Authentication session management with file persistence.

use rideshare_shared::{
    Acknowledgement, LoginRequest, RegisterRequest, Session, UpdateProfileRequest, User,
    ValidationError,
};

use crate::api_client::ApiClient;
use crate::error::{ClientError, ClientResult, StorageError};
use crate::storage::FileStore;
use crate::ws::RealtimeManager;

/// Storage key of the persisted session.
pub const SESSION_KEY: &str = "session";

/// Owns the signed-in session and hands out authenticated API clients.
#[derive(Debug, Clone)]
pub struct SessionManager {
    api: ApiClient,
    storage: FileStore,
    session: Option<Session>,
}

impl SessionManager {
    /// `api` is the unauthenticated base client; its token is ignored.
    pub fn new(api: ApiClient, storage: FileStore) -> Self {
        Self {
            api: api.with_token(None),
            storage,
            session: None,
        }
    }

    /// Load a previously saved session. Unreadable session data is removed
    /// and treated as signed out.
    pub fn restore(&mut self) -> ClientResult<Option<&Session>> {
        let stored = match self.storage.load::<Session>(SESSION_KEY) {
            Ok(stored) => stored,
            Err(StorageError::Serde(e)) => {
                tracing::warn!(error = %e, "discarding corrupt stored session");
                self.storage.remove(SESSION_KEY)?;
                None
            }
            Err(e) => return Err(e.into()),
        };

        self.session = stored.filter(|s| !s.token.trim().is_empty() && !s.user.id.trim().is_empty());
        match &self.session {
            Some(session) => tracing::info!(user_id = %session.user.id, "session restored"),
            None => tracing::debug!("no stored session"),
        }
        Ok(self.session.as_ref())
    }

    pub async fn login(&mut self, email: &str, password: &str) -> ClientResult<&Session> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::new("email", "Email is required").into());
        }
        if password.is_empty() {
            return Err(ValidationError::new("password", "Password is required").into());
        }

        let credentials = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let session = self.api.login(&credentials).await.map_err(|e| {
            tracing::warn!(%email, error = %e, "login failed");
            e
        })?;

        self.storage.save(SESSION_KEY, &session)?;
        tracing::info!(user_id = %session.user.id, "logged in");
        Ok(self.session.insert(session))
    }

    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<Acknowledgement> {
        if request.email.trim().is_empty() {
            return Err(ValidationError::new("email", "Email is required").into());
        }
        if request.password.is_empty() {
            return Err(ValidationError::new("password", "Password is required").into());
        }
        Ok(self.api.register(request).await?)
    }

    /// Forget the session on disk and in memory, close the realtime channel
    /// and empty its notification store.
    pub fn logout(&mut self, realtime: &RealtimeManager) -> ClientResult<()> {
        realtime.shutdown();
        realtime.store().clear();
        self.storage.remove(SESSION_KEY)?;
        if let Some(session) = self.session.take() {
            tracing::info!(user_id = %session.user.id, "logged out");
        }
        Ok(())
    }

    /// Send a profile update and merge it into the stored user.
    pub async fn update_user(&mut self, update: &UpdateProfileRequest) -> ClientResult<&User> {
        let api = self.client()?;
        api.update_profile(update).await?;

        let session = self.session.as_mut().ok_or(ClientError::NotAuthenticated)?;
        session.user.apply_update(update);
        self.storage.save(SESSION_KEY, &*session)?;
        Ok(&session.user)
    }

    /// Replace the stored user with the server's profile.
    pub async fn refresh_profile(&mut self) -> ClientResult<&User> {
        let user = self.client()?.profile().await?;
        let session = self.session.as_mut().ok_or(ClientError::NotAuthenticated)?;
        session.user = user;
        self.storage.save(SESSION_KEY, &*session)?;
        Ok(&session.user)
    }

    pub fn current(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user.id.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// API client carrying the session token.
    pub fn client(&self) -> ClientResult<ApiClient> {
        let token = self.token().ok_or(ClientError::NotAuthenticated)?;
        Ok(self.api.clone().with_token(Some(token.to_string())))
    }
}
