//! Meeting repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own writes to the `meetings` table.
//! - Enrich meeting reads with the ids of users holding an attendance row.
//!
//! # Invariants
//! - Meetings are listed ascending by `scheduled_at`, ties by creation order.
//! - Deleting a meeting cascades to its attendance rows.
//! - Soft-deleting the owning group does not touch meetings.

use crate::model::group::GroupId;
use crate::model::meeting::{Meeting, MeetingId, MeetingPatch, MeetingValidationError};
use crate::repo::group_repo::{parse_uuid, RepoError, RepoResult};
use crate::repo::schema::{ensure_connection_ready, MEETING_TABLES};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const MEETING_SELECT_SQL: &str = "SELECT
    id,
    group_id,
    title,
    description,
    scheduled_at,
    location,
    created_at
FROM meetings";

/// Repository interface for meeting records.
pub trait MeetingRepository {
    /// Persists a new meeting and returns its id.
    fn create_meeting(&self, meeting: &Meeting) -> RepoResult<MeetingId>;
    /// Loads one meeting with its attendee ids.
    fn get_meeting(&self, id: MeetingId) -> RepoResult<Option<Meeting>>;
    /// Applies a partial update. Fails with `NotFound` when the meeting is
    /// absent.
    fn update_meeting(&self, id: MeetingId, patch: &MeetingPatch) -> RepoResult<()>;
    /// Hard-deletes a meeting. Returns whether a row was removed.
    fn delete_meeting(&self, id: MeetingId) -> RepoResult<bool>;
    /// Lists a group's meetings ascending by schedule time.
    fn list_meetings(&self, group_id: GroupId) -> RepoResult<Vec<Meeting>>;
}

impl<T: MeetingRepository + ?Sized> MeetingRepository for &T {
    fn create_meeting(&self, meeting: &Meeting) -> RepoResult<MeetingId> {
        (**self).create_meeting(meeting)
    }

    fn get_meeting(&self, id: MeetingId) -> RepoResult<Option<Meeting>> {
        (**self).get_meeting(id)
    }

    fn update_meeting(&self, id: MeetingId, patch: &MeetingPatch) -> RepoResult<()> {
        (**self).update_meeting(id, patch)
    }

    fn delete_meeting(&self, id: MeetingId) -> RepoResult<bool> {
        (**self).delete_meeting(id)
    }

    fn list_meetings(&self, group_id: GroupId) -> RepoResult<Vec<Meeting>> {
        (**self).list_meetings(group_id)
    }
}

/// SQLite-backed meeting repository.
pub struct SqliteMeetingRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMeetingRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, MEETING_TABLES)?;
        Ok(Self { conn })
    }
}

impl MeetingRepository for SqliteMeetingRepository<'_> {
    fn create_meeting(&self, meeting: &Meeting) -> RepoResult<MeetingId> {
        meeting.validate()?;
        self.conn.execute(
            "INSERT INTO meetings (
                id,
                group_id,
                title,
                description,
                scheduled_at,
                location,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                meeting.id.to_string(),
                meeting.group_id.to_string(),
                meeting.title.as_str(),
                meeting.description.as_deref(),
                meeting.scheduled_at,
                meeting.location.as_deref(),
                meeting.created_at,
            ],
        )?;
        Ok(meeting.id)
    }

    fn get_meeting(&self, id: MeetingId) -> RepoResult<Option<Meeting>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEETING_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut meeting = parse_meeting_row(row)?;
        meeting.attendees = load_attendee_ids(self.conn, &meeting.id.to_string())?;
        Ok(Some(meeting))
    }

    fn update_meeting(&self, id: MeetingId, patch: &MeetingPatch) -> RepoResult<()> {
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(MeetingValidationError::EmptyTitle.into());
            }
        }

        let mut assignments: Vec<&'static str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(title) = &patch.title {
            assignments.push("title = ?");
            bind_values.push(Value::Text(title.trim().to_string()));
        }
        if let Some(description) = &patch.description {
            assignments.push("description = ?");
            bind_values.push(optional_text(description.as_deref()));
        }
        if let Some(scheduled_at) = patch.scheduled_at {
            assignments.push("scheduled_at = ?");
            bind_values.push(Value::Integer(scheduled_at));
        }
        if let Some(location) = &patch.location {
            assignments.push("location = ?");
            bind_values.push(optional_text(location.as_deref()));
        }

        // An empty patch still has to report a missing meeting.
        let changed = if assignments.is_empty() {
            self.conn.query_row(
                "SELECT COUNT(*) FROM meetings WHERE id = ?1;",
                [id.to_string()],
                |row| row.get::<_, i64>(0),
            )? as usize
        } else {
            let sql = format!("UPDATE meetings SET {} WHERE id = ?;", assignments.join(", "));
            bind_values.push(Value::Text(id.to_string()));
            self.conn.execute(&sql, params_from_iter(bind_values))?
        };

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn delete_meeting(&self, id: MeetingId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM meetings WHERE id = ?1;", params![id.to_string()])?;
        Ok(changed > 0)
    }

    fn list_meetings(&self, group_id: GroupId) -> RepoResult<Vec<Meeting>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEETING_SELECT_SQL}
             WHERE group_id = ?1
             ORDER BY scheduled_at ASC, created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([group_id.to_string()])?;
        let mut meetings = Vec::new();
        while let Some(row) = rows.next()? {
            meetings.push(parse_meeting_row(row)?);
        }
        drop(rows);

        for meeting in &mut meetings {
            meeting.attendees = load_attendee_ids(self.conn, &meeting.id.to_string())?;
        }
        Ok(meetings)
    }
}

fn load_attendee_ids(conn: &Connection, meeting_id: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT user_id
         FROM meeting_attendees
         WHERE meeting_id = ?1
         ORDER BY rowid ASC;",
    )?;
    let ids = stmt
        .query_map([meeting_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn parse_meeting_row(row: &Row<'_>) -> RepoResult<Meeting> {
    let id_text: String = row.get("id")?;
    let group_id_text: String = row.get("group_id")?;
    Ok(Meeting {
        id: parse_uuid(&id_text, "meetings.id")?,
        group_id: parse_uuid(&group_id_text, "meetings.group_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        scheduled_at: row.get("scheduled_at")?,
        location: row.get("location")?,
        created_at: row.get("created_at")?,
        attendees: Vec::new(),
    })
}

fn optional_text(value: Option<&str>) -> Value {
    match value {
        Some(text) => Value::Text(text.to_string()),
        None => Value::Null,
    }
}
