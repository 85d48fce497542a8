//! Rideshare Watch - terminal notification watcher
//!
//! Signs in (or reuses the stored session), loads the notification list,
//! then follows the realtime channel and logs toasts until Ctrl-C.
//!
//! Credentials for a fresh login come from `RIDESHARE_EMAIL` and
//! `RIDESHARE_PASSWORD`.

use anyhow::{bail, Context};
use rideshare_client::{
    logging, ApiClient, ClientConfig, ConnectionState, FileStore, NotificationCenter, Notifications,
    RealtimeEvent, RealtimeManager, SessionManager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    logging::init(logging::DEFAULT_FILTER);

    let config = ClientConfig::from_env();
    tracing::info!(api = %config.api_url, realtime = %config.connection.realtime_url, "starting");

    let storage = FileStore::at(config.data_dir.as_deref()).context("locating storage directory")?;
    let mut session = SessionManager::new(ApiClient::new().with_base_url(&config.api_url), storage);

    if session.restore().context("restoring session")?.is_none() {
        let (Ok(email), Ok(password)) = (
            std::env::var("RIDESHARE_EMAIL"),
            std::env::var("RIDESHARE_PASSWORD"),
        ) else {
            bail!("no stored session; set RIDESHARE_EMAIL and RIDESHARE_PASSWORD to log in");
        };
        session
            .login(&email, &password)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))
            .context("logging in")?;
    }

    let user_id = session
        .user_id()
        .context("session has no user id")?
        .to_string();

    let store = Notifications::new();
    let center = NotificationCenter::new(session.client()?, store.clone())
        .with_policy(config.response_policy);
    match center.load().await {
        Ok(count) => tracing::info!(count, badge = %store.badge(), "inbox loaded"),
        Err(e) => tracing::warn!(error = %e, "could not load notifications"),
    }

    let manager = RealtimeManager::new(config.connection.clone(), store.clone());
    RealtimeManager::install_global(manager.clone());
    let mut subscription = manager.init(&user_id)?;
    let mut states = subscription.state_changes();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            Ok(()) = states.changed() => {
                let state = states.borrow_and_update().clone();
                tracing::debug!(?state, "connection state");
                if let ConnectionState::Failed { reason } = state {
                    tracing::error!(%reason, "giving up on the realtime channel");
                    break;
                }
            }
            event = subscription.recv() => match event {
                Some(RealtimeEvent::Toast(toast)) => {
                    tracing::info!(level = ?toast.level, "{}", toast.text);
                }
                Some(RealtimeEvent::Notification { notification, inserted: true }) => {
                    tracing::info!(
                        title = %notification.title,
                        unread = store.unread_count(),
                        badge = %store.badge(),
                        "{}",
                        notification.message
                    );
                }
                Some(RealtimeEvent::Notification { .. }) => {}
                None => {
                    tracing::warn!(state = ?manager.state(), "realtime channel ended");
                    break;
                }
            }
        }
    }

    manager.close(subscription);
    Ok(())
}
