use super::models::NotificationRecord;
use super::operation::NotificationStoreOperation;
use super::schema::NOTIFICATION_VERSIONED_SCHEMAS;
use super::{MessageIndex, NotificationStore};
use crate::notification::{MessageReference, NotificationId};
use crate::sqlite_persistence::open_versioned_db;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

const SELECT_RECORDS: &str = "SELECT m.account_uuid AS account_uuid, m.folder_id AS folder_id,
            m.uid AS uid, n.notification_id AS notification_id, n.timestamp AS timestamp
     FROM notifications n
     JOIN messages m ON m.id = n.message_id";

const MESSAGE_ID_SUBQUERY: &str =
    "(SELECT id FROM messages WHERE account_uuid = ?1 AND folder_id = ?2 AND uid = ?3)";

pub struct SqliteNotificationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteNotificationStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path, NOTIFICATION_VERSIONED_SCHEMAS, "notification")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `operations` in one transaction, calling `after_each` once an
    /// operation has been written. An error from either rolls back the whole
    /// batch.
    fn persist_with_hook<F>(
        &self,
        operations: &[NotificationStoreOperation],
        mut after_each: F,
    ) -> Result<()>
    where
        F: FnMut(usize, &NotificationStoreOperation) -> Result<()>,
    {
        if operations.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .context("Failed to begin notification transaction")?;
        let now = Utc::now().timestamp_millis();

        for (index, operation) in operations.iter().enumerate() {
            Self::apply_operation(&tx, operation, now).with_context(|| {
                format!(
                    "Failed to apply {} for {}",
                    operation.as_str(),
                    operation.message()
                )
            })?;
            after_each(index, operation)?;
        }

        tx.commit()
            .context("Failed to commit notification transaction")?;
        debug!("Persisted {} notification operations", operations.len());
        Ok(())
    }

    /// Returns the number of affected rows. Zero means the message is unknown
    /// or there was nothing to change.
    fn apply_operation(
        tx: &Transaction,
        operation: &NotificationStoreOperation,
        now: i64,
    ) -> Result<usize> {
        let affected = match operation {
            NotificationStoreOperation::Add {
                message,
                notification_id,
                timestamp,
            } => tx.execute(
                "INSERT INTO notifications (message_id, notification_id, timestamp)
                 SELECT id, ?4, ?5 FROM messages
                 WHERE account_uuid = ?1 AND folder_id = ?2 AND uid = ?3
                 ON CONFLICT(message_id) DO UPDATE SET
                     notification_id = excluded.notification_id,
                     timestamp = excluded.timestamp",
                params![
                    message.account_uuid,
                    message.folder_id,
                    message.uid,
                    i64::from(*notification_id),
                    timestamp
                ],
            )?,
            NotificationStoreOperation::ChangeToActive {
                message,
                notification_id,
            } => tx.execute(
                "INSERT INTO notifications (message_id, notification_id, timestamp)
                 SELECT id, ?4, ?5 FROM messages
                 WHERE account_uuid = ?1 AND folder_id = ?2 AND uid = ?3
                 ON CONFLICT(message_id) DO UPDATE SET
                     notification_id = excluded.notification_id",
                params![
                    message.account_uuid,
                    message.folder_id,
                    message.uid,
                    i64::from(*notification_id),
                    now
                ],
            )?,
            NotificationStoreOperation::ChangeToInactive { message } => tx.execute(
                &format!(
                    "UPDATE notifications SET notification_id = NULL WHERE message_id = {}",
                    MESSAGE_ID_SUBQUERY
                ),
                params![message.account_uuid, message.folder_id, message.uid],
            )?,
            NotificationStoreOperation::Remove { message } => tx.execute(
                &format!(
                    "DELETE FROM notifications WHERE message_id = {}",
                    MESSAGE_ID_SUBQUERY
                ),
                params![message.account_uuid, message.folder_id, message.uid],
            )?,
        };

        if affected == 0 {
            debug!(
                "{} for {} changed nothing",
                operation.as_str(),
                operation.message()
            );
        }
        Ok(affected)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<NotificationRecord> {
        let notification_id = row
            .get::<_, Option<i64>>("notification_id")?
            .map(NotificationId::try_from)
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, Box::new(e)))?;

        Ok(NotificationRecord {
            message: MessageReference {
                account_uuid: row.get("account_uuid")?,
                folder_id: row.get("folder_id")?,
                uid: row.get("uid")?,
            },
            notification_id,
            timestamp: row.get("timestamp")?,
        })
    }
}

impl NotificationStore for SqliteNotificationStore {
    fn persist_notification_changes(
        &self,
        operations: &[NotificationStoreOperation],
    ) -> Result<()> {
        self.persist_with_hook(operations, |_, _| Ok(()))
    }

    fn clear_notifications(&self) -> Result<()> {
        let conn = self.lock();
        let deleted = conn
            .execute("DELETE FROM notifications", [])
            .context("Failed to clear notifications")?;
        info!("Cleared {} persisted notification records", deleted);
        Ok(())
    }

    fn get_notification_record(
        &self,
        message: &MessageReference,
    ) -> Result<Option<NotificationRecord>> {
        let conn = self.lock();
        let record = conn
            .query_row(
                &format!(
                    "{} WHERE m.account_uuid = ?1 AND m.folder_id = ?2 AND m.uid = ?3",
                    SELECT_RECORDS
                ),
                params![message.account_uuid, message.folder_id, message.uid],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn get_notification_records(&self, account_uuid: &str) -> Result<Vec<NotificationRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE m.account_uuid = ?1 ORDER BY n.timestamp DESC, n.message_id DESC",
            SELECT_RECORDS
        ))?;
        let records = stmt
            .query_map(params![account_uuid], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

impl MessageIndex for SqliteNotificationStore {
    fn add_message(&self, message: &MessageReference) -> Result<bool> {
        let conn = self.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO messages (account_uuid, folder_id, uid) VALUES (?1, ?2, ?3)",
            params![message.account_uuid, message.folder_id, message.uid],
        )?;
        Ok(inserted > 0)
    }

    fn remove_message(&self, message: &MessageReference) -> Result<bool> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM messages WHERE account_uuid = ?1 AND folder_id = ?2 AND uid = ?3",
            params![message.account_uuid, message.folder_id, message.uid],
        )?;
        Ok(deleted > 0)
    }

    fn contains_message(&self, message: &MessageReference) -> Result<bool> {
        let conn = self.lock();
        let exists = conn
            .query_row(
                "SELECT 1 FROM messages WHERE account_uuid = ?1 AND folder_id = ?2 AND uid = ?3",
                params![message.account_uuid, message.folder_id, message.uid],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(exists)
    }
}
