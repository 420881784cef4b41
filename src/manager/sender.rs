use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{
    cancel_logged, present, NotificationError, PlatformNotifier, Presented, TransitionLock,
};
use crate::notification::{MessageReference, Notification, NotificationId};
use crate::registry::NotificationRegistry;
use crate::store::{NotificationStore, NotificationStoreOperation};

/// Raises notifications: registers them, puts them on screen and records the
/// new-mail ones in the store.
pub struct NotificationSender {
    registry: Arc<NotificationRegistry>,
    store: Arc<dyn NotificationStore>,
    platform: Arc<dyn PlatformNotifier>,
    transitions: Arc<TransitionLock>,
    max_active_per_account: usize,
}

impl NotificationSender {
    pub(crate) fn new(
        registry: Arc<NotificationRegistry>,
        store: Arc<dyn NotificationStore>,
        platform: Arc<dyn PlatformNotifier>,
        transitions: Arc<TransitionLock>,
        max_active_per_account: usize,
    ) -> Self {
        if max_active_per_account == 0 {
            warn!("max_active_per_account is 0, keeping one notification per account");
        }
        Self {
            registry,
            store,
            platform,
            transitions,
            max_active_per_account: max_active_per_account.max(1),
        }
    }

    /// Shows `notification` and returns its id.
    ///
    /// Raising a notification that is already registered returns the existing
    /// id without touching the platform or the store. A new-mail notification
    /// for a message that already has one takes over its id and is shown in
    /// its place. If the platform refuses to show it, the registration is
    /// rolled back.
    pub fn show(&self, notification: Notification) -> Result<NotificationId, NotificationError> {
        let _transition = self.transitions.acquire();

        let outcome = present(&self.registry, self.platform.as_ref(), &notification);
        let (id, presented) = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(message) = notification.message_reference() {
                    let retract = NotificationStoreOperation::ChangeToInactive {
                        message: message.clone(),
                    };
                    self.store.persist_notification_changes(&[retract])?;
                }
                return Err(NotificationError::Platform(e));
            }
        };

        let Some(message) = notification.message_reference() else {
            return Ok(id);
        };
        let mut operations = match presented {
            Presented::Unchanged => {
                debug!("Notification already shown as {}", id);
                return Ok(id);
            }
            Presented::New => vec![NotificationStoreOperation::Add {
                message: message.clone(),
                notification_id: id,
                timestamp: Utc::now().timestamp_millis(),
            }],
            Presented::Replaced => vec![NotificationStoreOperation::ChangeToActive {
                message: message.clone(),
                notification_id: id,
            }],
        };
        for evicted in self.evict_overflow(notification.account_uuid()) {
            operations.push(NotificationStoreOperation::ChangeToInactive { message: evicted });
        }

        self.store.persist_notification_changes(&operations)?;
        Ok(id)
    }

    /// Unregisters and cancels the oldest new-mail notifications of an account
    /// beyond the cap, returning the messages they were about.
    fn evict_overflow(&self, account_uuid: &str) -> Vec<MessageReference> {
        let registrar = self.registry.registrar();
        let new_mail_ids: Vec<NotificationId> = registrar
            .iter()
            .filter(|(_, n)| n.message_reference().is_some() && n.account_uuid() == account_uuid)
            .map(|(id, _)| *id)
            .collect();

        let overflow = new_mail_ids
            .len()
            .saturating_sub(self.max_active_per_account);
        let mut evicted = Vec::with_capacity(overflow);
        for id in new_mail_ids.into_iter().take(overflow) {
            let Some(notification) = self.registry.unregister(id) else {
                continue;
            };
            cancel_logged(self.platform.as_ref(), id);
            if let Some(message) = notification.message_reference() {
                debug!("Evicted notification {} for {}", id, message);
                evicted.push(message.clone());
            }
        }
        evicted
    }

    /// Brings the notifications of an account back after a restart.
    ///
    /// Persisted ids from the previous run are cancelled unless the registry
    /// currently owns them. The newest active records, up to the cap, are
    /// handed to `resolve`: those it resolves are shown again under a fresh id,
    /// the others are removed. Active records beyond the cap become inactive.
    /// Everything is written in one batch.
    ///
    /// `resolve` runs while the manager is busy and must not call back into it.
    ///
    /// Returns the ids of the restored notifications, newest first.
    pub fn restore_account<F>(
        &self,
        account_uuid: &str,
        mut resolve: F,
    ) -> Result<Vec<NotificationId>, NotificationError>
    where
        F: FnMut(&MessageReference) -> Option<Notification>,
    {
        let _transition = self.transitions.acquire();

        let active: Vec<_> = self
            .store
            .get_notification_records(account_uuid)?
            .into_iter()
            .filter(|r| r.is_active())
            .collect();

        // Cancel stale ids before any fresh id is handed out
        for stale_id in active.iter().filter_map(|r| r.notification_id) {
            if self.registry.get(stale_id).is_none() {
                cancel_logged(self.platform.as_ref(), stale_id);
            }
        }

        let mut operations = Vec::with_capacity(active.len());
        let mut restored = Vec::new();
        for (index, record) in active.into_iter().enumerate() {
            let message = record.message;
            if index >= self.max_active_per_account {
                operations.push(NotificationStoreOperation::ChangeToInactive { message });
                continue;
            }

            let Some(notification) = resolve(&message) else {
                debug!("Message {} is gone, dropping its notification record", message);
                operations.push(NotificationStoreOperation::Remove { message });
                continue;
            };

            match present(&self.registry, self.platform.as_ref(), &notification) {
                Ok((id, _)) => {
                    operations.push(NotificationStoreOperation::ChangeToActive {
                        message,
                        notification_id: id,
                    });
                    restored.push(id);
                }
                Err(e) => {
                    warn!("Failed to restore notification for {}: {:#}", message, e);
                    operations.push(NotificationStoreOperation::ChangeToInactive { message });
                }
            }
        }

        self.store.persist_notification_changes(&operations)?;
        info!(
            "Restored {} notifications for account {}",
            restored.len(),
            account_uuid
        );
        Ok(restored)
    }
}
