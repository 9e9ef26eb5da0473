//! Connection readiness checks shared by SQLite repositories.

use crate::db::migrations::{current_user_version, latest_version};
use crate::repo::group_repo::{RepoError, RepoResult};
use rusqlite::Connection;

/// Required table with the columns repositories read or write.
pub(crate) type TableSpec = (&'static str, &'static [&'static str]);

pub(crate) const GROUP_TABLES: &[TableSpec] = &[
    (
        "study_groups",
        &[
            "id",
            "name",
            "description",
            "category",
            "leader_id",
            "max_members",
            "current_members",
            "is_active",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "group_members",
        &["group_id", "user_id", "user_name", "role", "joined_at"],
    ),
];

pub(crate) const MEETING_TABLES: &[TableSpec] = &[
    (
        "meetings",
        &[
            "id",
            "group_id",
            "title",
            "description",
            "scheduled_at",
            "location",
            "created_at",
        ],
    ),
    (
        "meeting_attendees",
        &["meeting_id", "user_id", "user_name", "status", "updated_at"],
    ),
];

/// Rejects connections that are not migrated to the latest schema or lack
/// any of the given tables/columns.
pub(crate) fn ensure_connection_ready(conn: &Connection, tables: &[TableSpec]) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
