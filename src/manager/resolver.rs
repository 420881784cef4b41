use crate::notification::{MessageReference, Notification};

/// Rebuilds the notification for a message that only exists in the store.
///
/// Used to bring back notifications that were pushed out by the per-account
/// cap once a slot frees up. Implementations must not call back into the
/// manager.
pub trait MessageResolver: Send + Sync {
    /// Returns `None` when the message no longer warrants a notification.
    fn resolve(&self, message: &MessageReference) -> Option<Notification>;
}

impl<F> MessageResolver for F
where
    F: Fn(&MessageReference) -> Option<Notification> + Send + Sync,
{
    fn resolve(&self, message: &MessageReference) -> Option<Notification> {
        self(message)
    }
}
