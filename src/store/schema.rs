//! SQLite schema definitions for the notification database.
//!
//! `messages` is the index of known messages that notification records join
//! against; `notifications` holds at most one record per message.

use crate::sqlite_column;
use crate::sqlite_persistence::{ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Messages and notification records
// =============================================================================

pub const MESSAGES_TABLE_V1: Table = Table {
    name: "messages",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("account_uuid", &SqlType::Text, non_null = true),
        sqlite_column!("folder_id", &SqlType::Integer, non_null = true),
        sqlite_column!("uid", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_messages_account", "account_uuid")],
    unique_constraints: &[&["account_uuid", "folder_id", "uid"]],
};

const MESSAGE_FK: ForeignKey = ForeignKey {
    foreign_table: "messages",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// `notification_id` is NULL for inactive records.
pub const NOTIFICATIONS_TABLE_V1: Table = Table {
    name: "notifications",
    columns: &[
        sqlite_column!(
            "message_id",
            &SqlType::Integer,
            is_primary_key = true,
            foreign_key = Some(&MESSAGE_FK)
        ),
        sqlite_column!("notification_id", &SqlType::Integer),
        sqlite_column!("timestamp", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_notifications_notification_id", "notification_id")],
    unique_constraints: &[],
};

// =============================================================================
// Version 2 - Timestamp index, records are restored newest first
// =============================================================================

pub const NOTIFICATIONS_TABLE_V2: Table = Table {
    name: "notifications",
    columns: NOTIFICATIONS_TABLE_V1.columns,
    indices: &[
        ("idx_notifications_notification_id", "notification_id"),
        ("idx_notifications_timestamp", "timestamp DESC"),
    ],
    unique_constraints: &[],
};

fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE INDEX idx_notifications_timestamp ON notifications(timestamp DESC)",
        [],
    )?;
    Ok(())
}

// =============================================================================
// Versioned Schema Definition
// =============================================================================

pub const NOTIFICATION_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[MESSAGES_TABLE_V1, NOTIFICATIONS_TABLE_V1],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[MESSAGES_TABLE_V1, NOTIFICATIONS_TABLE_V2],
        migration: Some(migrate_v1_to_v2),
    },
];
