//! Entry point for raising and retracting notifications.
//!
//! [`NotificationManager`] wires a [`NotificationSender`] and a
//! [`NotificationDismisser`] to one shared [`NotificationRegistry`], so both
//! always see the same set of live notifications. The manager itself holds no
//! notification state.
//!
//! Every transition of the registry and the store write recording it happen
//! under one [`TransitionLock`], so a write about a notification can never
//! land after a later transition of the same notification.

mod dismisser;
mod error;
mod platform;
mod resolver;
mod sender;

pub use dismisser::NotificationDismisser;
pub use error::NotificationError;
pub use platform::PlatformNotifier;
pub use resolver::MessageResolver;
pub use sender::NotificationSender;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::config::NotificationSettings;
use crate::notification::{MessageReference, Notification, NotificationCategory, NotificationId};
use crate::registry::{NotificationRegistry, Registrar};
use crate::store::NotificationStore;
use crate::stream::NotificationStream;

/// Serializes the sender's and the dismisser's transitions.
#[derive(Default)]
pub(crate) struct TransitionLock(Mutex<()>);

impl TransitionLock {
    pub(crate) fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How [`present`] put a notification on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Presented {
    /// An equal notification was already registered.
    Unchanged,
    New,
    /// It took over the slot of another notification for the same message.
    Replaced,
}

/// Registers `notification` and shows it unless it is already registered.
///
/// On platform failure the registration is rolled back. A taken-over slot
/// still shows the previous content, so it is cancelled too.
pub(crate) fn present(
    registry: &NotificationRegistry,
    platform: &dyn PlatformNotifier,
    notification: &Notification,
) -> anyhow::Result<(NotificationId, Presented)> {
    let (registration, displaced) = registry.register_replacing(notification.clone());
    let id = registration.id;
    let presented = match (registration.is_new, displaced.is_some()) {
        (true, _) => Presented::New,
        (false, true) => Presented::Replaced,
        (false, false) => return Ok((id, Presented::Unchanged)),
    };

    if let Err(e) = platform.show(id, notification) {
        warn!("Failed to show notification {}: {:#}", id, e);
        registry.unregister(id);
        if presented == Presented::Replaced {
            cancel_logged(platform, id);
        }
        return Err(e);
    }
    Ok((id, presented))
}

pub(crate) fn cancel_logged(platform: &dyn PlatformNotifier, id: NotificationId) {
    if let Err(e) = platform.cancel(id) {
        warn!("Failed to cancel notification {}: {:#}", id, e);
    }
}

pub struct NotificationManager {
    registry: Arc<NotificationRegistry>,
    sender: Arc<NotificationSender>,
    dismisser: Arc<NotificationDismisser>,
}

impl NotificationManager {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        platform: Arc<dyn PlatformNotifier>,
        settings: &NotificationSettings,
    ) -> Self {
        Self::build(store, platform, None, settings)
    }

    /// Like [`Self::new`], also bringing back notifications pushed out by the
    /// cap when a slot frees up. `resolver` rebuilds them from their message.
    pub fn with_resolver(
        store: Arc<dyn NotificationStore>,
        platform: Arc<dyn PlatformNotifier>,
        resolver: Arc<dyn MessageResolver>,
        settings: &NotificationSettings,
    ) -> Self {
        Self::build(store, platform, Some(resolver), settings)
    }

    fn build(
        store: Arc<dyn NotificationStore>,
        platform: Arc<dyn PlatformNotifier>,
        resolver: Option<Arc<dyn MessageResolver>>,
        settings: &NotificationSettings,
    ) -> Self {
        let registry = Arc::new(NotificationRegistry::with_first_id(
            settings.first_notification_id,
        ));
        let transitions = Arc::new(TransitionLock::default());
        let sender = Arc::new(NotificationSender::new(
            registry.clone(),
            store.clone(),
            platform.clone(),
            transitions.clone(),
            settings.max_active_per_account,
        ));
        let dismisser = Arc::new(NotificationDismisser::new(
            registry.clone(),
            store,
            platform,
            transitions,
            resolver,
            settings.max_active_per_account,
        ));

        Self {
            registry,
            sender,
            dismisser,
        }
    }

    pub fn show(&self, notification: Notification) -> Result<NotificationId, NotificationError> {
        self.sender.show(notification)
    }

    pub fn dismiss(&self, id: NotificationId) -> Result<Option<Notification>, NotificationError> {
        self.dismisser.dismiss(id)
    }

    pub fn dismiss_notification(
        &self,
        notification: &Notification,
    ) -> Result<Option<NotificationId>, NotificationError> {
        self.dismisser.dismiss_notification(notification)
    }

    pub fn deactivate_message(
        &self,
        message: &MessageReference,
    ) -> Result<Option<NotificationId>, NotificationError> {
        self.dismisser.deactivate_message(message)
    }

    pub fn clear_account(&self, account_uuid: &str) -> Result<usize, NotificationError> {
        self.dismisser.clear_account(account_uuid)
    }

    pub fn clear_all(&self) -> Result<usize, NotificationError> {
        self.dismisser.clear_all()
    }

    pub fn restore_account<F>(
        &self,
        account_uuid: &str,
        resolve: F,
    ) -> Result<Vec<NotificationId>, NotificationError>
    where
        F: FnMut(&MessageReference) -> Option<Notification>,
    {
        self.sender.restore_account(account_uuid, resolve)
    }

    pub fn stream(&self, category: NotificationCategory) -> NotificationStream {
        NotificationStream::new(category, self.registry.subscribe())
    }

    pub fn registrar(&self) -> Arc<Registrar> {
        self.registry.registrar()
    }

    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.registry.get(id)
    }

    pub fn get_id(&self, notification: &Notification) -> Option<NotificationId> {
        self.registry.get_id(notification)
    }
}
