//! In-memory notification registry.
//!
//! Associates every live [`Notification`] value with a [`NotificationId`].
//! Registering a value that is already registered returns the existing id, so
//! repeated raises of the same notification collapse into a single slot.
//!
//! All mutations go through one mutex: the dedup lookup, the id allocation and
//! the insertion into both maps happen in the same critical section. Every
//! mutation also publishes an immutable snapshot of the id -> notification map
//! on a `watch` channel before the lock is released, which is what
//! [`NotificationRegistry::registrar`] and the notification streams read.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::notification::{Notification, NotificationId};

/// Read-only view of the registered notifications, ordered by id.
pub type Registrar = BTreeMap<NotificationId, Notification>;

/// Result of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub id: NotificationId,
    /// False when an equal notification was already registered.
    pub is_new: bool,
}

struct RegistryState {
    by_id: Registrar,
    by_value: HashMap<Notification, NotificationId>,
    first_id: u32,
    next_id: u32,
}

impl RegistryState {
    fn allocate_id(&mut self) -> NotificationId {
        loop {
            let candidate = NotificationId::new(self.next_id);
            self.next_id = self.next_id.checked_add(1).unwrap_or(self.first_id);
            if !self.by_id.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn remove_id(&mut self, id: NotificationId) -> Option<Notification> {
        let notification = self.by_id.remove(&id)?;
        self.by_value.remove(&notification);
        Some(notification)
    }
}

pub struct NotificationRegistry {
    state: Mutex<RegistryState>,
    snapshot: watch::Sender<Arc<Registrar>>,
}

impl Default for NotificationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationRegistry {
    pub fn new() -> Self {
        Self::with_first_id(1)
    }

    /// Creates a registry whose ids start at `first_id`.
    pub fn with_first_id(first_id: u32) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Registrar::new()));
        Self {
            state: Mutex::new(RegistryState {
                by_id: Registrar::new(),
                by_value: HashMap::new(),
                first_id,
                next_id: first_id,
            }),
            snapshot,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called with the state lock held.
    fn publish(&self, state: &RegistryState) {
        self.snapshot.send_replace(Arc::new(state.by_id.clone()));
    }

    /// Returns the id of `notification`, registering it first if needed.
    pub fn register(&self, notification: Notification) -> NotificationId {
        self.register_with_outcome(notification).id
    }

    /// Like [`Self::register`], also telling whether a new id was allocated.
    pub fn register_with_outcome(&self, notification: Notification) -> Registration {
        let mut state = self.lock();
        if let Some(id) = state.by_value.get(&notification) {
            debug!("Notification already registered as {}", id);
            return Registration {
                id: *id,
                is_new: false,
            };
        }

        let id = state.allocate_id();
        state.by_value.insert(notification.clone(), id);
        state.by_id.insert(id, notification);
        self.publish(&state);
        debug!("Registered notification {}", id);

        Registration { id, is_new: true }
    }

    /// Like [`Self::register_with_outcome`], but a message keeps at most one
    /// slot: a message-bound notification takes over the id of any other
    /// notification registered for the same message, which is returned.
    pub fn register_replacing(
        &self,
        notification: Notification,
    ) -> (Registration, Option<Notification>) {
        let mut state = self.lock();
        if let Some(id) = state.by_value.get(&notification) {
            let id = *id;
            return (Registration { id, is_new: false }, None);
        }

        let previous = notification.message_reference().and_then(|message| {
            state
                .by_id
                .iter()
                .find(|(_, n)| n.message_reference() == Some(message))
                .map(|(id, _)| *id)
        });
        let (id, displaced) = match previous {
            Some(id) => (id, state.remove_id(id)),
            None => (state.allocate_id(), None),
        };
        state.by_value.insert(notification.clone(), id);
        state.by_id.insert(id, notification);
        self.publish(&state);
        match displaced {
            Some(_) => debug!("Replaced notification {}", id),
            None => debug!("Registered notification {}", id),
        }

        (
            Registration {
                id,
                is_new: displaced.is_none(),
            },
            displaced,
        )
    }

    /// Removes the notification registered as `id`, if any.
    pub fn unregister(&self, id: NotificationId) -> Option<Notification> {
        let mut state = self.lock();
        let removed = state.remove_id(id)?;
        self.publish(&state);
        debug!("Unregistered notification {}", id);
        Some(removed)
    }

    /// Removes `notification` by value, returning the id it was registered as.
    pub fn unregister_notification(&self, notification: &Notification) -> Option<NotificationId> {
        let mut state = self.lock();
        let id = state.by_value.remove(notification)?;
        state.by_id.remove(&id);
        self.publish(&state);
        debug!("Unregistered notification {}", id);
        Some(id)
    }

    /// Removes every notification matching `predicate` in one step.
    pub fn unregister_where<F>(&self, mut predicate: F) -> Vec<(NotificationId, Notification)>
    where
        F: FnMut(&Notification) -> bool,
    {
        let mut state = self.lock();
        let ids: Vec<NotificationId> = state
            .by_id
            .iter()
            .filter(|(_, notification)| predicate(notification))
            .map(|(id, _)| *id)
            .collect();
        if ids.is_empty() {
            return Vec::new();
        }

        let removed: Vec<(NotificationId, Notification)> = ids
            .into_iter()
            .filter_map(|id| state.remove_id(id).map(|n| (id, n)))
            .collect();
        self.publish(&state);
        debug!("Unregistered {} notifications", removed.len());
        removed
    }

    /// Removes everything, returning what was registered.
    pub fn clear(&self) -> Vec<(NotificationId, Notification)> {
        let mut state = self.lock();
        state.by_value.clear();
        let removed: Vec<(NotificationId, Notification)> =
            std::mem::take(&mut state.by_id).into_iter().collect();
        self.publish(&state);
        removed
    }

    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.lock().by_id.get(&id).cloned()
    }

    pub fn get_id(&self, notification: &Notification) -> Option<NotificationId> {
        self.lock().by_value.get(notification).copied()
    }

    /// Consistent snapshot of everything currently registered.
    pub fn registrar(&self) -> Arc<Registrar> {
        self.snapshot.borrow().clone()
    }

    /// Receiver that is notified with a fresh snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Registrar>> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
