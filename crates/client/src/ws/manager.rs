//! Reference-counted owner of the realtime connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use rideshare_shared::{Notification, ServerEvent};
use tokio::sync::{broadcast, watch};

use super::connection::{ConnectionState, EventSink, RealtimeConnection, RealtimeHandle};
use crate::config::ConnectionSettings;
use crate::display::{toast_for, Toast};
use crate::error::RealtimeError;
use crate::stores::Notifications;

const EVENT_BUFFER: usize = 64;

/// Events delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// A notification was pushed. `inserted` is false for a duplicate id.
    Notification {
        notification: Notification,
        inserted: bool,
    },
    /// A booking outcome arrived; show it without blocking.
    Toast(Toast),
}

struct Active {
    generation: u64,
    user_id: String,
    subscribers: usize,
    connection: RealtimeConnection,
    events: broadcast::Sender<RealtimeEvent>,
}

struct ManagerInner {
    settings: ConnectionSettings,
    store: Notifications,
    active: Mutex<Option<Active>>,
    next_generation: AtomicU64,
}

/// Owns at most one realtime connection, shared by every live subscription.
#[derive(Clone)]
pub struct RealtimeManager {
    inner: Arc<ManagerInner>,
}

static GLOBAL: OnceLock<RealtimeManager> = OnceLock::new();

impl RealtimeManager {
    pub fn new(settings: ConnectionSettings, store: Notifications) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                settings,
                store,
                active: Mutex::new(None),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Register `manager` as the process-wide instance. Returns false if one
    /// was already installed.
    pub fn install_global(manager: RealtimeManager) -> bool {
        GLOBAL.set(manager).is_ok()
    }

    pub fn global() -> Option<&'static RealtimeManager> {
        GLOBAL.get()
    }

    pub fn store(&self) -> &Notifications {
        &self.inner.store
    }

    fn lock(&self) -> MutexGuard<'_, Option<Active>> {
        self.inner.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe as `user_id`, opening the connection if needed.
    ///
    /// An empty id is refused without any I/O. A different id than the
    /// current connection's closes that connection and empties the store
    /// first. A connection that gave up (`Failed`) is replaced by a fresh
    /// one; subscriptions to it stop receiving events. Must be called inside
    /// a tokio runtime.
    pub fn init(&self, user_id: &str) -> Result<Subscription, RealtimeError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            tracing::debug!("realtime init without a user id");
            return Err(RealtimeError::MissingUserId);
        }

        let mut active = self.lock();

        if let Some(current) = active.as_mut() {
            if current.user_id == user_id && !current.connection.current_state().is_failed() {
                current.subscribers += 1;
                tracing::debug!(%user_id, subscribers = current.subscribers, "reusing realtime channel");
                return Ok(self.subscription(current));
            }
        }

        let socket_url = self.inner.settings.socket_url()?;

        if let Some(previous) = active.take() {
            if previous.user_id == user_id {
                tracing::info!(%user_id, "restarting failed realtime channel");
            } else {
                tracing::info!(from = %previous.user_id, to = %user_id, "switching realtime user");
                self.inner.store.clear();
            }
            previous.connection.shutdown();
        }

        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let connection = RealtimeConnection::spawn(
            self.inner.settings.clone(),
            socket_url,
            user_id.to_string(),
            self.event_sink(events.clone()),
        );

        let current = active.insert(Active {
            generation: self.inner.next_generation.fetch_add(1, Ordering::Relaxed),
            user_id: user_id.to_string(),
            subscribers: 1,
            connection,
            events,
        });
        tracing::info!(%user_id, "realtime channel opening");
        Ok(self.subscription(current))
    }

    /// Drop a subscription. The connection stays open while others remain.
    pub fn close(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Close the connection regardless of live subscriptions; they stop
    /// receiving events.
    pub fn shutdown(&self) {
        if let Some(active) = self.lock().take() {
            tracing::info!(user_id = %active.user_id, "realtime channel shut down");
            active.connection.shutdown();
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().as_ref().map_or(0, |a| a.subscribers)
    }

    pub fn current_user(&self) -> Option<String> {
        self.lock().as_ref().map(|a| a.user_id.clone())
    }

    pub fn state(&self) -> ConnectionState {
        self.lock()
            .as_ref()
            .map_or(ConnectionState::Disconnected, |a| a.connection.current_state())
    }

    pub fn handle(&self) -> Option<RealtimeHandle> {
        self.lock().as_ref().map(|a| a.connection.handle())
    }

    fn subscription(&self, active: &Active) -> Subscription {
        Subscription {
            manager: self.clone(),
            generation: active.generation,
            events: active.events.subscribe(),
            state: active.connection.state(),
            handle: active.connection.handle(),
        }
    }

    fn detach(&self, generation: u64) {
        let mut active = self.lock();
        let Some(current) = active.as_mut() else {
            return;
        };
        // Subscriptions from a replaced connection no longer count.
        if current.generation != generation {
            return;
        }
        current.subscribers = current.subscribers.saturating_sub(1);
        if current.subscribers == 0 {
            if let Some(last) = active.take() {
                tracing::info!(user_id = %last.user_id, "last subscriber left, closing realtime channel");
                last.connection.shutdown();
            }
        }
    }

    fn event_sink(&self, events: broadcast::Sender<RealtimeEvent>) -> EventSink {
        let store = self.inner.store.clone();
        Arc::new(move |event: ServerEvent| match event {
            ServerEvent::Notification(notification) => {
                let inserted = store.add(notification.clone());
                tracing::info!(
                    id = %notification.id,
                    kind = notification.kind.as_str(),
                    inserted,
                    "notification received"
                );
                let toast = if inserted { toast_for(&notification) } else { None };
                let _ = events.send(RealtimeEvent::Notification {
                    notification,
                    inserted,
                });
                if let Some(toast) = toast {
                    tracing::info!(text = %toast.text, "toast");
                    let _ = events.send(RealtimeEvent::Toast(toast));
                }
            }
            ServerEvent::Other { name, .. } => {
                tracing::debug!(event = %name, "ignoring realtime event");
            }
        })
    }
}

/// A live listener on the realtime channel. Dropping it detaches only this
/// listener; the last one to go closes the connection.
pub struct Subscription {
    manager: RealtimeManager,
    generation: u64,
    events: broadcast::Receiver<RealtimeEvent>,
    state: watch::Receiver<ConnectionState>,
    handle: RealtimeHandle,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("generation", &self.generation)
            .field("user_id", &self.handle.user_id)
            .finish()
    }
}

impl Subscription {
    /// Next event, or `None` once the connection has been shut down.
    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber lagged, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<RealtimeEvent> {
        loop {
            match self.events.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// A separate receiver for state changes, usable alongside [`recv`](Self::recv).
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the connection state satisfies `pred`.
    pub async fn wait_for_state(
        &mut self,
        pred: impl FnMut(&ConnectionState) -> bool,
    ) -> Result<ConnectionState, RealtimeError> {
        self.state
            .wait_for(pred)
            .await
            .map(|state| (*state).clone())
            .map_err(|_| RealtimeError::Closed)
    }

    pub fn handle(&self) -> &RealtimeHandle {
        &self.handle
    }

    pub fn user_id(&self) -> &str {
        &self.handle.user_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.manager.detach(self.generation);
    }
}
