//! Test environment creation
//!
//! Every environment owns its own temporary directory, so notification
//! databases never leak between tests.

use super::constants::*;
use super::notifier::RecordingNotifier;
use mail_notification_tracker::config::NotificationSettings;
use mail_notification_tracker::{
    MessageIndex, MessageReference, MessageResolver, Notification, NotificationManager,
    SqliteNotificationStore,
};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestEnv {
    pub manager: NotificationManager,
    pub store: Arc<SqliteNotificationStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub db_path: PathBuf,
    settings: NotificationSettings,
    refill: bool,
    _temp_dir: TempDir, // Keep temp dir alive
}

#[allow(dead_code)]
impl TestEnv {
    pub fn new() -> Self {
        Self::with_settings(NotificationSettings::default())
    }

    pub fn with_settings(settings: NotificationSettings) -> Self {
        Self::create(settings, false)
    }

    /// Environment whose manager refills freed slots, resolving messages with
    /// [`mail_for`].
    pub fn with_refill(settings: NotificationSettings) -> Self {
        Self::create(settings, true)
    }

    fn create(settings: NotificationSettings, refill: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("notifications.db");
        Self::open(
            temp_dir,
            db_path,
            Arc::new(RecordingNotifier::new()),
            settings,
            refill,
        )
    }

    fn open(
        temp_dir: TempDir,
        db_path: PathBuf,
        notifier: Arc<RecordingNotifier>,
        settings: NotificationSettings,
        refill: bool,
    ) -> Self {
        let store = Arc::new(
            SqliteNotificationStore::new(&db_path).expect("Failed to open notification store"),
        );
        let manager = if refill {
            let resolver: Arc<dyn MessageResolver> =
                Arc::new(|message: &MessageReference| Some(mail_for(message)));
            NotificationManager::with_resolver(store.clone(), notifier.clone(), resolver, &settings)
        } else {
            NotificationManager::new(store.clone(), notifier.clone(), &settings)
        };
        Self {
            manager,
            store,
            notifier,
            db_path,
            settings,
            refill,
            _temp_dir: temp_dir,
        }
    }

    /// Simulates the process being killed and started again.
    ///
    /// The in-memory registry is lost and the database is reopened. The
    /// platform notifier survives, the way the OS keeps showing notifications
    /// of a dead process.
    pub fn restart(self) -> Self {
        let settings = self.settings.clone();
        self.restart_with_settings(settings)
    }

    pub fn restart_with_settings(self, settings: NotificationSettings) -> Self {
        let TestEnv {
            manager,
            store,
            notifier,
            db_path,
            refill,
            _temp_dir: temp_dir,
            ..
        } = self;
        drop(manager);
        drop(store);
        Self::open(temp_dir, db_path, notifier, settings, refill)
    }
}

/// The new-mail notification the tests raise for `message`.
pub fn mail_for(message: &MessageReference) -> Notification {
    Notification::NewMail {
        message: message.clone(),
        sender: "sender@example.com".to_string(),
        subject: format!("Message {}", message.uid),
        preview: format!("Preview of {}", message.uid),
    }
}

/// Creates a new-mail notification and makes its message known to the store.
pub fn new_mail_in(env: &TestEnv, account_uuid: &str, uid: &str) -> Notification {
    let message = MessageReference::new(account_uuid, INBOX_FOLDER_ID, uid);
    env.store
        .add_message(&message)
        .expect("Failed to add message");
    mail_for(&message)
}

pub fn new_mail(env: &TestEnv, uid: &str) -> Notification {
    new_mail_in(env, ACCOUNT_1, uid)
}

/// Makes every write of [`POISONED_NOTIFICATION_ID`] to the notification
/// table fail, the way a disk error in the middle of a batch would.
pub fn failing_operation_trigger(db_path: &Path) {
    let conn = Connection::open(db_path).expect("Failed to open database");
    conn.execute_batch(&format!(
        "CREATE TRIGGER fail_poisoned_insert BEFORE INSERT ON notifications
         WHEN NEW.notification_id = {id}
         BEGIN SELECT RAISE(ABORT, 'injected failure'); END;
         CREATE TRIGGER fail_poisoned_update BEFORE UPDATE ON notifications
         WHEN NEW.notification_id = {id}
         BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
        id = POISONED_NOTIFICATION_ID
    ))
    .expect("Failed to install failure trigger");
}
