use thiserror::Error;

/// Errors surfaced by the notification manager.
///
/// Benign absence (dismissing something already gone, deactivating a message
/// without a notification) is never an error.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The store could not durably record a lifecycle change. The registry
    /// stays as it is until the next successful write or a restore.
    #[error("Store error: {0}")]
    Persistence(#[from] anyhow::Error),

    #[error("Platform error: {0}")]
    Platform(anyhow::Error),
}
