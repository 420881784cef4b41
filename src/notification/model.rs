//! Notification value model.
//!
//! A [`Notification`] describes *what* should be shown. Two notifications are
//! the same notification if and only if they are structurally equal, which is
//! what the registry relies on to collapse repeated raises into one slot.

use serde::{Deserialize, Serialize};

use super::MessageReference;

/// Where a notification is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    /// Shown by the platform (system tray, lock screen).
    System,
    /// Shown inside the app (banners, inline lists).
    InApp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSeverity {
    /// Goes away on its own once the background work finishes.
    Temporary,
    Information,
    Warning,
    Critical,
    /// Blocks the account until the user acts.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A single new message.
    NewMail {
        message: MessageReference,
        sender: String,
        subject: String,
        preview: String,
    },
    /// Summary of all new messages of an account.
    NewMailSummary {
        account_uuid: String,
        new_message_count: u32,
        additional_message_count: u32,
    },
    /// Background sync in progress.
    Fetching {
        account_uuid: String,
        folder_name: Option<String>,
    },
    /// Outgoing mail in progress.
    Sending { account_uuid: String },
    SendFailed {
        account_uuid: String,
        reason: String,
    },
    AuthenticationError {
        account_uuid: String,
        incoming: bool,
    },
    CertificateError {
        account_uuid: String,
        incoming: bool,
    },
}

const SYSTEM_ONLY: &[NotificationCategory] = &[NotificationCategory::System];
const SYSTEM_AND_IN_APP: &[NotificationCategory] =
    &[NotificationCategory::System, NotificationCategory::InApp];

impl Notification {
    pub fn account_uuid(&self) -> &str {
        match self {
            Notification::NewMail { message, .. } => &message.account_uuid,
            Notification::NewMailSummary { account_uuid, .. }
            | Notification::Fetching { account_uuid, .. }
            | Notification::Sending { account_uuid }
            | Notification::SendFailed { account_uuid, .. }
            | Notification::AuthenticationError { account_uuid, .. }
            | Notification::CertificateError { account_uuid, .. } => account_uuid,
        }
    }

    /// The message this notification is about, if any. Only message-bound
    /// notifications are tracked in the persisted store.
    pub fn message_reference(&self) -> Option<&MessageReference> {
        match self {
            Notification::NewMail { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn categories(&self) -> &'static [NotificationCategory] {
        match self {
            Notification::NewMail { .. }
            | Notification::NewMailSummary { .. }
            | Notification::Fetching { .. }
            | Notification::Sending { .. } => SYSTEM_ONLY,
            Notification::SendFailed { .. }
            | Notification::AuthenticationError { .. }
            | Notification::CertificateError { .. } => SYSTEM_AND_IN_APP,
        }
    }

    pub fn is_in(&self, category: NotificationCategory) -> bool {
        self.categories().contains(&category)
    }

    pub fn severity(&self) -> NotificationSeverity {
        match self {
            Notification::Fetching { .. } | Notification::Sending { .. } => {
                NotificationSeverity::Temporary
            }
            Notification::NewMail { .. } | Notification::NewMailSummary { .. } => {
                NotificationSeverity::Information
            }
            Notification::SendFailed { .. } => NotificationSeverity::Critical,
            Notification::AuthenticationError { .. } | Notification::CertificateError { .. } => {
                NotificationSeverity::Fatal
            }
        }
    }
}
