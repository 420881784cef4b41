//! Notification value types

mod id;
mod message_reference;
mod model;

pub use id::NotificationId;
pub use message_reference::{MessageReference, MessageReferenceParseError};
pub use model::{Notification, NotificationCategory, NotificationSeverity};
