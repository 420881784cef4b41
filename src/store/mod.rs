mod models;
mod operation;
mod schema;
mod sqlite_notification_store;

pub use models::NotificationRecord;
pub use operation::NotificationStoreOperation;
pub use schema::NOTIFICATION_VERSIONED_SCHEMAS;
pub use sqlite_notification_store::SqliteNotificationStore;

use anyhow::Result;

use crate::notification::MessageReference;

/// Durable record of which messages have (or had) a notification.
pub trait NotificationStore: Send + Sync {
    /// Applies all operations in order as a single atomic batch. On error
    /// none of them is visible.
    fn persist_notification_changes(&self, operations: &[NotificationStoreOperation])
        -> Result<()>;

    /// Drops every persisted notification record. Messages are kept.
    fn clear_notifications(&self) -> Result<()>;

    fn get_notification_record(&self, message: &MessageReference)
        -> Result<Option<NotificationRecord>>;

    /// All records of an account, newest first.
    fn get_notification_records(&self, account_uuid: &str) -> Result<Vec<NotificationRecord>>;
}

/// Index of messages known to the local database.
///
/// Notification records can only exist for messages in this index, and are
/// dropped together with their message.
pub trait MessageIndex: Send + Sync {
    /// Returns true if the message was not known before.
    fn add_message(&self, message: &MessageReference) -> Result<bool>;
    /// Returns true if the message existed.
    fn remove_message(&self, message: &MessageReference) -> Result<bool>;
    fn contains_message(&self, message: &MessageReference) -> Result<bool>;
}
