use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    cancel_logged, present, MessageResolver, NotificationError, PlatformNotifier, TransitionLock,
};
use crate::notification::{MessageReference, Notification, NotificationId};
use crate::registry::NotificationRegistry;
use crate::store::{NotificationStore, NotificationStoreOperation};

/// Retracts notifications: unregisters them, cancels them on the platform and
/// records the new state of their messages.
///
/// With a [`MessageResolver`], a slot freed by a retracted new-mail
/// notification is refilled with the newest notification of the same account
/// that the cap had pushed out.
pub struct NotificationDismisser {
    registry: Arc<NotificationRegistry>,
    store: Arc<dyn NotificationStore>,
    platform: Arc<dyn PlatformNotifier>,
    transitions: Arc<TransitionLock>,
    resolver: Option<Arc<dyn MessageResolver>>,
    max_active_per_account: usize,
}

impl NotificationDismisser {
    pub(crate) fn new(
        registry: Arc<NotificationRegistry>,
        store: Arc<dyn NotificationStore>,
        platform: Arc<dyn PlatformNotifier>,
        transitions: Arc<TransitionLock>,
        resolver: Option<Arc<dyn MessageResolver>>,
        max_active_per_account: usize,
    ) -> Self {
        Self {
            registry,
            store,
            platform,
            transitions,
            resolver,
            max_active_per_account: max_active_per_account.max(1),
        }
    }

    /// Dismisses the notification registered as `id`.
    ///
    /// Returns `None` when nothing is registered under `id`. The record of a
    /// message-bound notification is removed. When the platform fails to
    /// cancel, the registry and the store are updated anyway and the platform
    /// error is returned.
    pub fn dismiss(&self, id: NotificationId) -> Result<Option<Notification>, NotificationError> {
        let _transition = self.transitions.acquire();

        let Some(notification) = self.registry.unregister(id) else {
            debug!("Notification {} already dismissed", id);
            return Ok(None);
        };

        let cancelled = self.platform.cancel(id);
        if let Some(message) = notification.message_reference() {
            let mut operations = vec![NotificationStoreOperation::Remove {
                message: message.clone(),
            }];
            operations.extend(self.refill(message)?);
            self.store.persist_notification_changes(&operations)?;
        }
        cancelled.map_err(NotificationError::Platform)?;
        Ok(Some(notification))
    }

    pub fn dismiss_notification(
        &self,
        notification: &Notification,
    ) -> Result<Option<NotificationId>, NotificationError> {
        let Some(id) = self.registry.get_id(notification) else {
            return Ok(None);
        };
        Ok(self.dismiss(id)?.map(|_| id))
    }

    /// Marks `message` as no longer notified, e.g. after it was read on
    /// another device.
    ///
    /// The store is updated even when no notification is registered for the
    /// message, which clears ids left over from a previous run.
    pub fn deactivate_message(
        &self,
        message: &MessageReference,
    ) -> Result<Option<NotificationId>, NotificationError> {
        let _transition = self.transitions.acquire();

        let dismissed = self
            .registry
            .unregister_where(|n| n.message_reference() == Some(message));
        for (id, _) in &dismissed {
            cancel_logged(self.platform.as_ref(), *id);
        }

        let mut operations = vec![NotificationStoreOperation::ChangeToInactive {
            message: message.clone(),
        }];
        if !dismissed.is_empty() {
            operations.extend(self.refill(message)?);
        }
        self.store.persist_notification_changes(&operations)?;
        Ok(dismissed.first().map(|(id, _)| *id))
    }

    /// Shows inactive notifications of the account of `retracted` again while
    /// the account is below the cap, newest first.
    ///
    /// Returns the operations recording the outcome. Records the resolver no
    /// longer knows are removed.
    fn refill(
        &self,
        retracted: &MessageReference,
    ) -> Result<Vec<NotificationStoreOperation>, NotificationError> {
        let Some(resolver) = &self.resolver else {
            return Ok(Vec::new());
        };
        let account_uuid = retracted.account_uuid.as_str();
        let registered = self
            .registry
            .registrar()
            .values()
            .filter(|n| n.message_reference().is_some() && n.account_uuid() == account_uuid)
            .count();
        let mut free = self.max_active_per_account.saturating_sub(registered);
        if free == 0 {
            return Ok(Vec::new());
        }

        let mut operations = Vec::new();
        for record in self.store.get_notification_records(account_uuid)? {
            if free == 0 {
                break;
            }
            if record.is_active() || &record.message == retracted {
                continue;
            }

            let message = record.message;
            let Some(notification) = resolver.resolve(&message) else {
                debug!("Message {} is gone, dropping its notification record", message);
                operations.push(NotificationStoreOperation::Remove { message });
                continue;
            };
            match present(&self.registry, self.platform.as_ref(), &notification) {
                Ok((id, _)) => {
                    debug!("Refilled slot with notification {} for {}", id, message);
                    operations.push(NotificationStoreOperation::ChangeToActive {
                        message,
                        notification_id: id,
                    });
                    free -= 1;
                }
                Err(e) => warn!("Failed to show notification for {}: {:#}", message, e),
            }
        }
        Ok(operations)
    }

    /// Dismisses every notification of an account and forgets its records.
    pub fn clear_account(&self, account_uuid: &str) -> Result<usize, NotificationError> {
        let _transition = self.transitions.acquire();

        let dismissed = self
            .registry
            .unregister_where(|n| n.account_uuid() == account_uuid);
        for (id, _) in &dismissed {
            cancel_logged(self.platform.as_ref(), *id);
        }

        let records = self.store.get_notification_records(account_uuid)?;
        let mut operations = Vec::with_capacity(records.len());
        for record in records {
            if let Some(stale_id) = record.notification_id {
                if self.registry.get(stale_id).is_none()
                    && !dismissed.iter().any(|(id, _)| *id == stale_id)
                {
                    cancel_logged(self.platform.as_ref(), stale_id);
                }
            }
            operations.push(NotificationStoreOperation::Remove {
                message: record.message,
            });
        }
        self.store.persist_notification_changes(&operations)?;

        info!(
            "Cleared {} notifications and {} records of account {}",
            dismissed.len(),
            operations.len(),
            account_uuid
        );
        Ok(dismissed.len())
    }

    /// Dismisses everything and drops all persisted records.
    pub fn clear_all(&self) -> Result<usize, NotificationError> {
        let _transition = self.transitions.acquire();

        let dismissed = self.registry.clear();
        for (id, _) in &dismissed {
            cancel_logged(self.platform.as_ref(), *id);
        }
        self.store.clear_notifications()?;
        info!("Cleared all {} notifications", dismissed.len());
        Ok(dismissed.len())
    }
}
