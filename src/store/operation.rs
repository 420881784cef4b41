use serde::{Deserialize, Serialize};

use crate::notification::{MessageReference, NotificationId};

/// A lifecycle transition of the persisted notification record of a message.
///
/// These are the only way to mutate the store. A batch is applied in order
/// inside one transaction, so later operations on the same message override
/// earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NotificationStoreOperation {
    /// Absent -> Active(id). Overwrites id and timestamp of an existing record.
    Add {
        message: MessageReference,
        notification_id: NotificationId,
        /// Unix timestamp in milliseconds.
        timestamp: i64,
    },
    /// Active|Inactive -> Active(id). Creates the record when missing.
    ChangeToActive {
        message: MessageReference,
        notification_id: NotificationId,
    },
    /// Active -> Inactive. The record and its timestamp are kept.
    ChangeToInactive { message: MessageReference },
    /// Active|Inactive -> Absent.
    Remove { message: MessageReference },
}

impl NotificationStoreOperation {
    pub fn message(&self) -> &MessageReference {
        match self {
            NotificationStoreOperation::Add { message, .. }
            | NotificationStoreOperation::ChangeToActive { message, .. }
            | NotificationStoreOperation::ChangeToInactive { message }
            | NotificationStoreOperation::Remove { message } => message,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStoreOperation::Add { .. } => "add",
            NotificationStoreOperation::ChangeToActive { .. } => "change_to_active",
            NotificationStoreOperation::ChangeToInactive { .. } => "change_to_inactive",
            NotificationStoreOperation::Remove { .. } => "remove",
        }
    }
}
