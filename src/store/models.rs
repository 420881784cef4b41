use serde::{Deserialize, Serialize};

use crate::notification::{MessageReference, NotificationId};

/// Persisted notification state of one message.
///
/// A record without a notification id is inactive: the message was notified
/// about before, but nothing is on screen for it anymore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub message: MessageReference,
    pub notification_id: Option<NotificationId>,
    /// Unix timestamp in milliseconds of when the message was first notified.
    pub timestamp: i64,
}

impl NotificationRecord {
    pub fn is_active(&self) -> bool {
        self.notification_id.is_some()
    }
}
