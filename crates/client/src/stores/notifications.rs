//! Notification store.
//!
//! [`NotificationStore`] is the plain ordered collection, newest first.
//! [`Notifications`] is the shared handle the realtime channel, the
//! notification center and views all hold; every mutation runs under one
//! write lock and bumps a revision counter observers can wait on.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rideshare_shared::Notification;
use tokio::sync::watch;

/// Ordered notification list, newest first, unique by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationStore {
    items: Vec<Notification>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a notification unless one with the same id is present.
    /// Returns false for duplicates.
    pub fn add(&mut self, notification: Notification) -> bool {
        if self.contains(&notification.id) {
            return false;
        }
        self.items.insert(0, notification);
        true
    }

    /// Mark one notification read. Returns true if its flag changed.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.is_read => {
                n.is_read = true;
                true
            }
            _ => false,
        }
    }

    /// Mark every notification read. Returns how many flags changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for n in self.items.iter_mut().filter(|n| !n.is_read) {
            n.is_read = true;
            changed += 1;
        }
        changed
    }

    /// Remove a notification. Returns true if it was present.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    /// Drop everything, local read flags included. Returns how many were held.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    /// Seed the store from a server listing.
    ///
    /// Server order is kept and later duplicates are dropped. Entries already
    /// read locally stay read even if the listing is stale.
    pub fn replace_all(&mut self, list: Vec<Notification>) {
        let mut items: Vec<Notification> = Vec::with_capacity(list.len());
        for mut n in list {
            if items.iter().any(|existing| existing.id == n.id) {
                continue;
            }
            if self.get(&n.id).is_some_and(|old| old.is_read) {
                n.is_read = true;
            }
            items.push(n);
        }
        self.items = items;
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Notification] {
        &self.items
    }
}

/// Badge text for an unread count: empty for none, capped at "9+".
pub fn badge_label(unread: usize) -> String {
    match unread {
        0 => String::new(),
        1..=9 => unread.to_string(),
        _ => "9+".to_string(),
    }
}

struct Shared {
    store: RwLock<NotificationStore>,
    revision: watch::Sender<u64>,
}

/// Shared, observable handle to a [`NotificationStore`].
#[derive(Clone)]
pub struct Notifications {
    shared: Arc<Shared>,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Notifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifications")
            .field("revision", &self.revision())
            .field("len", &self.len())
            .finish()
    }
}

impl Notifications {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                store: RwLock::new(NotificationStore::new()),
                revision,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, NotificationStore> {
        // A panic mid-mutation cannot leave the Vec half-updated.
        self.shared.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, NotificationStore> {
        self.shared.store.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one mutation under the write lock; bump the revision if it
    /// reports a change.
    fn mutate<R>(&self, op: impl FnOnce(&mut NotificationStore) -> R, changed: impl Fn(&R) -> bool) -> R {
        let result = {
            let mut store = self.write();
            op(&mut store)
        };
        if changed(&result) {
            self.shared.revision.send_modify(|rev| *rev += 1);
        }
        result
    }

    pub fn add(&self, notification: Notification) -> bool {
        let id = notification.id.clone();
        let inserted = self.mutate(|s| s.add(notification), |inserted| *inserted);
        if !inserted {
            tracing::debug!(%id, "duplicate notification ignored");
        }
        inserted
    }

    pub fn mark_read(&self, id: &str) -> bool {
        self.mutate(|s| s.mark_read(id), |changed| *changed)
    }

    pub fn mark_all_read(&self) -> usize {
        self.mutate(|s| s.mark_all_read(), |changed| *changed > 0)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.mutate(|s| s.delete(id), |removed| *removed)
    }

    pub fn replace_all(&self, list: Vec<Notification>) {
        self.mutate(|s| s.replace_all(list), |_| true)
    }

    /// Empty the store when the session it belongs to ends.
    pub fn clear(&self) -> usize {
        self.mutate(|s| s.clear(), |removed| *removed > 0)
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.read().unread_count()
    }

    pub fn badge(&self) -> String {
        badge_label(self.unread_count())
    }

    /// Copy of the current list in store order.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.read().as_slice().to_vec()
    }

    /// Ids in store order.
    pub fn ids(&self) -> Vec<String> {
        self.read().iter().map(|n| n.id.clone()).collect()
    }

    pub fn revision(&self) -> u64 {
        *self.shared.revision.borrow()
    }

    /// Receiver that changes whenever the store does.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rideshare_shared::{NotificationData, NotificationKind};

    fn note(id: &str, is_read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            kind: NotificationKind::BookingRequest,
            title: "New booking request".to_string(),
            message: format!("request {id}"),
            is_read,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            data: NotificationData::default(),
        }
    }

    #[test]
    fn add_is_idempotent() {
        let mut store = NotificationStore::new();
        assert!(store.add(note("n1", false)));
        assert!(!store.add(Notification {
            title: "changed".into(),
            ..note("n1", false)
        }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("n1").unwrap().title, "New booking request");
    }

    #[test]
    fn add_prepends() {
        let mut store = NotificationStore::new();
        store.add(note("n1", false));
        store.add(note("n2", false));
        store.add(note("n3", false));
        let ids: Vec<_> = store.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["n3", "n2", "n1"]);
    }

    #[test]
    fn mark_all_read_keeps_order() {
        let mut store = NotificationStore::new();
        store.replace_all(vec![note("n1", false), note("n2", false)]);
        assert_eq!(store.mark_all_read(), 2);
        let ids: Vec<_> = store.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["n1", "n2"]);
        assert!(store.iter().all(|n| n.is_read));
        assert_eq!(store.mark_all_read(), 0);
    }

    #[test]
    fn delete_removes_only_target() {
        let mut store = NotificationStore::new();
        store.replace_all(vec![note("n1", false), note("n2", false)]);
        assert!(store.delete("n1"));
        assert_eq!(store.as_slice(), &[note("n2", false)]);
        assert!(!store.delete("n1"));
    }

    #[test]
    fn mark_read_unknown_is_noop() {
        let mut store = NotificationStore::new();
        store.add(note("n1", false));
        assert!(!store.mark_read("missing"));
        assert!(store.mark_read("n1"));
        assert!(!store.mark_read("n1"));
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn read_flag_survives_stale_reload() {
        let mut store = NotificationStore::new();
        store.replace_all(vec![note("n1", false), note("n2", false)]);
        store.mark_read("n1");
        store.replace_all(vec![note("n1", false), note("n2", false), note("n1", false)]);
        assert_eq!(store.len(), 2);
        assert!(store.get("n1").unwrap().is_read);
        assert!(!store.get("n2").unwrap().is_read);
    }

    #[test]
    fn clear_forgets_read_flags() {
        let notifications = Notifications::new();
        notifications.add(note("n1", false));
        notifications.mark_read("n1");
        let rev = notifications.revision();

        assert_eq!(notifications.clear(), 1);
        assert!(notifications.is_empty());
        assert_eq!(notifications.revision(), rev + 1);
        assert_eq!(notifications.clear(), 0);
        assert_eq!(notifications.revision(), rev + 1);

        notifications.replace_all(vec![note("n1", false)]);
        assert!(!notifications.get("n1").unwrap().is_read);
    }

    #[test]
    fn badge_caps_at_nine() {
        assert_eq!(badge_label(0), "");
        assert_eq!(badge_label(1), "1");
        assert_eq!(badge_label(9), "9");
        assert_eq!(badge_label(10), "9+");
    }

    #[test]
    fn shared_handle_bumps_revision_on_change() {
        let notifications = Notifications::new();
        let rx = notifications.watch();
        assert_eq!(notifications.revision(), 0);

        assert!(notifications.add(note("n1", false)));
        assert_eq!(notifications.revision(), 1);
        assert!(rx.has_changed().unwrap());

        assert!(!notifications.add(note("n1", false)));
        assert!(!notifications.mark_read("other"));
        assert!(!notifications.delete("other"));
        assert_eq!(notifications.revision(), 1);

        assert!(notifications.mark_read("n1"));
        assert_eq!(notifications.revision(), 2);
        assert_eq!(notifications.badge(), "");
    }

    #[test]
    fn clones_share_state() {
        let a = Notifications::new();
        let b = a.clone();
        a.add(note("n1", false));
        assert_eq!(b.ids(), vec!["n1".to_string()]);
        assert_eq!(b.unread_count(), 1);
    }
}
