//! Notification identity, lifecycle and persistence tracking for a mail client.
//!
//! - [`registry`] hands out [`NotificationId`]s and collapses equal
//!   notifications into one slot.
//! - [`store`] durably records, per message, whether a notification is active.
//! - [`manager`] is the facade collaborators use to show and dismiss.
//! - [`stream`] lets UI code observe what is currently registered.

pub mod config;
pub mod manager;
pub mod notification;
pub mod registry;
pub mod sqlite_persistence;
pub mod store;
pub mod stream;

// Re-export commonly used types for convenience
pub use manager::{MessageResolver, NotificationError, NotificationManager, PlatformNotifier};
pub use notification::{
    MessageReference, Notification, NotificationCategory, NotificationId, NotificationSeverity,
};
pub use registry::NotificationRegistry;
pub use store::{
    MessageIndex, NotificationRecord, NotificationStore, NotificationStoreOperation,
    SqliteNotificationStore,
};
pub use stream::{ActiveNotification, NotificationStream};
