use anyhow::Result;

use crate::notification::{Notification, NotificationId};

/// The surface that actually puts notifications on screen.
///
/// Implementations render `notification` in the slot identified by `id`;
/// showing an id that is already on screen replaces it.
pub trait PlatformNotifier: Send + Sync {
    fn show(&self, id: NotificationId, notification: &Notification) -> Result<()>;

    /// Cancelling an id that is not shown must succeed.
    fn cancel(&self, id: NotificationId) -> Result<()>;
}
