//! Attendance repository contracts and SQLite implementation.
//!
//! # Invariants
//! - At most one row exists per `(meeting_id, user_id)`; repeated writes
//!   overwrite status and `updated_at`.
//! - Upserts against a missing meeting report `NotFound` and write nothing.

use crate::model::meeting::{AttendanceStatus, MeetingAttendee, MeetingId};
use crate::repo::group_repo::{parse_uuid, RepoError, RepoResult};
use crate::repo::schema::{ensure_connection_ready, MEETING_TABLES};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const ATTENDEE_SELECT_SQL: &str = "SELECT
    meeting_id,
    user_id,
    user_name,
    status,
    updated_at
FROM meeting_attendees";

/// Repository interface for per-meeting attendance.
pub trait AttendanceRepository {
    /// Inserts or overwrites one attendance row and returns the stored row.
    fn upsert_attendance(&self, attendee: &MeetingAttendee) -> RepoResult<MeetingAttendee>;
    /// Lists attendance rows for a meeting in first-answer order.
    fn list_attendees(&self, meeting_id: MeetingId) -> RepoResult<Vec<MeetingAttendee>>;
}

impl<T: AttendanceRepository + ?Sized> AttendanceRepository for &T {
    fn upsert_attendance(&self, attendee: &MeetingAttendee) -> RepoResult<MeetingAttendee> {
        (**self).upsert_attendance(attendee)
    }

    fn list_attendees(&self, meeting_id: MeetingId) -> RepoResult<Vec<MeetingAttendee>> {
        (**self).list_attendees(meeting_id)
    }
}

/// SQLite-backed attendance repository.
pub struct SqliteAttendanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttendanceRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, MEETING_TABLES)?;
        Ok(Self { conn })
    }
}

impl AttendanceRepository for SqliteAttendanceRepository<'_> {
    fn upsert_attendance(&self, attendee: &MeetingAttendee) -> RepoResult<MeetingAttendee> {
        attendee.validate()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let meeting_id = attendee.meeting_id.to_string();
        if !meeting_row_exists(&tx, meeting_id.as_str())? {
            return Err(RepoError::NotFound(attendee.meeting_id));
        }

        tx.execute(
            "INSERT INTO meeting_attendees (
                meeting_id,
                user_id,
                user_name,
                status,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(meeting_id, user_id) DO UPDATE SET
                user_name = excluded.user_name,
                status = excluded.status,
                updated_at = excluded.updated_at;",
            params![
                meeting_id.as_str(),
                attendee.user_id.as_str(),
                attendee.user_name.as_str(),
                attendee.status.as_str(),
                attendee.updated_at,
            ],
        )?;

        let stored = tx.query_row(
            &format!("{ATTENDEE_SELECT_SQL} WHERE meeting_id = ?1 AND user_id = ?2;"),
            params![meeting_id.as_str(), attendee.user_id.as_str()],
            |row| Ok(parse_attendee_row(row)),
        )??;
        tx.commit()?;
        Ok(stored)
    }

    fn list_attendees(&self, meeting_id: MeetingId) -> RepoResult<Vec<MeetingAttendee>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTENDEE_SELECT_SQL}
             WHERE meeting_id = ?1
             ORDER BY rowid ASC;"
        ))?;
        let mut rows = stmt.query([meeting_id.to_string()])?;
        let mut attendees = Vec::new();
        while let Some(row) = rows.next()? {
            attendees.push(parse_attendee_row(row)?);
        }
        Ok(attendees)
    }
}

fn meeting_row_exists(conn: &Connection, meeting_id: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM meetings WHERE id = ?1);",
        [meeting_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_attendee_row(row: &Row<'_>) -> RepoResult<MeetingAttendee> {
    let meeting_id_text: String = row.get("meeting_id")?;
    let status_text: String = row.get("status")?;
    let status = AttendanceStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in meeting_attendees.status"
        ))
    })?;

    Ok(MeetingAttendee {
        meeting_id: parse_uuid(&meeting_id_text, "meeting_attendees.meeting_id")?,
        user_id: row.get("user_id")?,
        user_name: row.get("user_name")?,
        status,
        updated_at: row.get("updated_at")?,
    })
}
