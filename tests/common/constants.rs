//! Shared constants for integration tests

/// Account most tests raise notifications for
pub const ACCOUNT_1: &str = "9c0d5f1e-account-one";

/// Second account, for isolation checks
pub const ACCOUNT_2: &str = "3b7a2e44-account-two";

/// Inbox folder id used by new-mail fixtures
pub const INBOX_FOLDER_ID: i64 = 1;

/// Notification id that the failure trigger refuses to persist
pub const POISONED_NOTIFICATION_ID: u32 = 666;
