//! Group/membership repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own every write to `study_groups` and `group_members`.
//! - Keep SQL details inside the storage boundary.
//!
//! # Invariants
//! - Write paths call `StudyGroup::validate()` / `GroupMember::validate()`
//!   before SQL mutations.
//! - `current_members` is recomputed with `COUNT(*)` inside the same
//!   transaction as every membership insert or delete.
//! - Membership inserts run in a `BEGIN IMMEDIATE` transaction that re-checks
//!   group state, duplicates and capacity, so concurrent joins on one group
//!   are serialized and the cap is never overshot.
//! - A capacity update only applies while the new cap is at least the
//!   member count counted in the same statement.
//! - Outcomes that carry a group read it before commit.
//! - The leader row is never removed by `remove_member`.

use crate::db::DbError;
use crate::model::group::{
    GroupCategory, GroupId, GroupMember, GroupPatch, GroupValidationError, MemberRole, StudyGroup,
};
use crate::model::meeting::MeetingValidationError;
use crate::model::now_epoch_ms;
use crate::repo::schema::{ensure_connection_ready, GROUP_TABLES};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const GROUP_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    category,
    leader_id,
    max_members,
    current_members,
    is_active,
    created_at,
    updated_at
FROM study_groups";

const MEMBER_SELECT_SQL: &str = "SELECT
    group_id,
    user_id,
    user_name,
    role,
    joined_at
FROM group_members";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by group, meeting and attendance storage.
#[derive(Debug)]
pub enum RepoError {
    /// Group-level field validation failed before persistence.
    GroupValidation(GroupValidationError),
    /// Meeting-level field validation failed before persistence.
    MeetingValidation(MeetingValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target group or meeting does not exist.
    NotFound(Uuid),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// The in-memory store mutex was poisoned by a panicking writer.
    LockPoisoned,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GroupValidation(err) => write!(f, "{err}"),
            Self::MeetingValidation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "group store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "group store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "group store requires column `{column}` in table `{table}`"
            ),
            Self::LockPoisoned => write!(f, "in-memory group store lock poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::GroupValidation(err) => Some(err),
            Self::MeetingValidation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GroupValidationError> for RepoError {
    fn from(value: GroupValidationError) -> Self {
        Self::GroupValidation(value)
    }
}

impl From<MeetingValidationError> for RepoError {
    fn from(value: MeetingValidationError) -> Self {
        Self::MeetingValidation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing active groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupListQuery {
    /// `None` lists every category.
    pub category: Option<GroupCategory>,
    pub limit: u32,
    pub offset: u32,
}

/// Result of a partial group update checked against the live member count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateGroupOutcome {
    /// Group as stored after the update, read in the same transaction.
    Updated(StudyGroup),
    GroupNotFound,
    BelowMemberCount { max_members: u32, current_members: u32 },
}

/// Result of an atomic membership insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddMemberOutcome {
    /// Group with the recomputed member count, read before commit.
    Added { group: StudyGroup },
    GroupNotFound,
    AlreadyMember,
    GroupFull { max_members: u32 },
}

/// Result of an atomic membership delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveMemberOutcome {
    Removed { group: StudyGroup },
    GroupNotFound,
    NotAMember,
    LeaderProtected,
}

/// Repository interface for groups and their membership relation.
pub trait GroupRepository {
    /// Persists a group and its leader row in one transaction and returns the
    /// stored group with `current_members` recomputed.
    fn create_group(&self, group: &StudyGroup, leader: &GroupMember) -> RepoResult<StudyGroup>;
    /// Loads one group; inactive groups are hidden unless requested.
    fn get_group(&self, id: GroupId, include_inactive: bool) -> RepoResult<Option<StudyGroup>>;
    /// Applies a partial update to an active group. A new `max_members` is
    /// compared with the member count inside the same write.
    fn update_group(&self, id: GroupId, patch: &GroupPatch) -> RepoResult<UpdateGroupOutcome>;
    /// Lists active groups newest-first.
    fn list_groups(&self, query: &GroupListQuery) -> RepoResult<Vec<StudyGroup>>;
    /// Counts active groups, independent of paging.
    fn count_groups(&self, category: Option<GroupCategory>) -> RepoResult<u64>;
    /// Marks a group inactive. Returns whether a row changed.
    fn soft_delete_group(&self, id: GroupId) -> RepoResult<bool>;
    /// Lists members, leader first, then by join time.
    fn list_members(&self, group_id: GroupId) -> RepoResult<Vec<GroupMember>>;
    /// Loads one membership row.
    fn get_member(&self, group_id: GroupId, user_id: &str) -> RepoResult<Option<GroupMember>>;
    /// Inserts a member if the group is active, the user is not yet a member
    /// and the cap allows it.
    fn add_member(&self, member: &GroupMember) -> RepoResult<AddMemberOutcome>;
    /// Deletes a non-leader membership row.
    fn remove_member(&self, group_id: GroupId, user_id: &str) -> RepoResult<RemoveMemberOutcome>;
}

impl<T: GroupRepository + ?Sized> GroupRepository for &T {
    fn create_group(&self, group: &StudyGroup, leader: &GroupMember) -> RepoResult<StudyGroup> {
        (**self).create_group(group, leader)
    }

    fn get_group(&self, id: GroupId, include_inactive: bool) -> RepoResult<Option<StudyGroup>> {
        (**self).get_group(id, include_inactive)
    }

    fn update_group(&self, id: GroupId, patch: &GroupPatch) -> RepoResult<UpdateGroupOutcome> {
        (**self).update_group(id, patch)
    }

    fn list_groups(&self, query: &GroupListQuery) -> RepoResult<Vec<StudyGroup>> {
        (**self).list_groups(query)
    }

    fn count_groups(&self, category: Option<GroupCategory>) -> RepoResult<u64> {
        (**self).count_groups(category)
    }

    fn soft_delete_group(&self, id: GroupId) -> RepoResult<bool> {
        (**self).soft_delete_group(id)
    }

    fn list_members(&self, group_id: GroupId) -> RepoResult<Vec<GroupMember>> {
        (**self).list_members(group_id)
    }

    fn get_member(&self, group_id: GroupId, user_id: &str) -> RepoResult<Option<GroupMember>> {
        (**self).get_member(group_id, user_id)
    }

    fn add_member(&self, member: &GroupMember) -> RepoResult<AddMemberOutcome> {
        (**self).add_member(member)
    }

    fn remove_member(&self, group_id: GroupId, user_id: &str) -> RepoResult<RemoveMemberOutcome> {
        (**self).remove_member(group_id, user_id)
    }
}

/// SQLite-backed group repository.
pub struct SqliteGroupRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGroupRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, GROUP_TABLES)?;
        Ok(Self { conn })
    }
}

impl GroupRepository for SqliteGroupRepository<'_> {
    fn create_group(&self, group: &StudyGroup, leader: &GroupMember) -> RepoResult<StudyGroup> {
        group.validate()?;
        leader.validate()?;
        if leader.group_id != group.id
            || leader.role != MemberRole::Leader
            || leader.user_id != group.leader_id
        {
            return Err(RepoError::InvalidData(
                "leader row must match the group id and leader id".to_string(),
            ));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let group_id = group.id.to_string();
        tx.execute(
            "INSERT INTO study_groups (
                id,
                name,
                description,
                category,
                leader_id,
                max_members,
                current_members,
                is_active,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9);",
            params![
                group_id.as_str(),
                group.name.as_str(),
                group.description.as_str(),
                group.category.as_str(),
                group.leader_id.as_str(),
                i64::from(group.max_members),
                bool_to_int(group.is_active),
                group.created_at,
                group.updated_at,
            ],
        )?;
        insert_member(&tx, leader)?;
        recompute_member_count(&tx, group_id.as_str())?;
        let stored = load_group(&tx, group_id.as_str())?.ok_or(RepoError::NotFound(group.id))?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_group(&self, id: GroupId, include_inactive: bool) -> RepoResult<Option<StudyGroup>> {
        let group = load_group(self.conn, id.to_string().as_str())?;
        Ok(group.filter(|group| include_inactive || group.is_active))
    }

    fn update_group(&self, id: GroupId, patch: &GroupPatch) -> RepoResult<UpdateGroupOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let group_id = id.to_string();
        match load_group(&tx, group_id.as_str())? {
            Some(group) if group.is_active => {}
            _ => return Ok(UpdateGroupOutcome::GroupNotFound),
        }

        let changed = tx.execute(
            "UPDATE study_groups
             SET
                name = COALESCE(?2, name),
                description = COALESCE(?3, description),
                max_members = COALESCE(?4, max_members),
                updated_at = ?5
             WHERE id = ?1
               AND is_active = 1
               AND (?4 IS NULL OR ?4 >= (
                    SELECT COUNT(*)
                    FROM group_members
                    WHERE group_id = ?1
               ));",
            params![
                group_id.as_str(),
                patch.name.as_deref(),
                patch.description.as_deref(),
                patch.max_members.map(i64::from),
                now_epoch_ms(),
            ],
        )?;

        if changed == 0 {
            let Some(max_members) = patch.max_members else {
                return Ok(UpdateGroupOutcome::GroupNotFound);
            };
            return Ok(UpdateGroupOutcome::BelowMemberCount {
                max_members,
                current_members: count_members(&tx, group_id.as_str())?,
            });
        }
        let stored = load_group(&tx, group_id.as_str())?.ok_or(RepoError::NotFound(id))?;
        tx.commit()?;
        Ok(UpdateGroupOutcome::Updated(stored))
    }

    fn list_groups(&self, query: &GroupListQuery) -> RepoResult<Vec<StudyGroup>> {
        let mut sql = format!("{GROUP_SELECT_SQL} WHERE is_active = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(category) = query.category {
            sql.push_str(" AND category = ?");
            bind_values.push(Value::Text(category.as_str().to_string()));
        }

        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(query.limit)));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            groups.push(parse_group_row(row)?);
        }
        Ok(groups)
    }

    fn count_groups(&self, category: Option<GroupCategory>) -> RepoResult<u64> {
        let total: i64 = match category {
            Some(category) => self.conn.query_row(
                "SELECT COUNT(*) FROM study_groups WHERE is_active = 1 AND category = ?1;",
                [category.as_str()],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM study_groups WHERE is_active = 1;",
                [],
                |row| row.get(0),
            )?,
        };
        u64::try_from(total)
            .map_err(|_| RepoError::InvalidData(format!("negative group count `{total}`")))
    }

    fn soft_delete_group(&self, id: GroupId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE study_groups
             SET
                is_active = 0,
                updated_at = ?2
             WHERE id = ?1
               AND is_active = 1;",
            params![id.to_string(), now_epoch_ms()],
        )?;
        Ok(changed > 0)
    }

    fn list_members(&self, group_id: GroupId) -> RepoResult<Vec<GroupMember>> {
        load_members(self.conn, group_id.to_string().as_str())
    }

    fn get_member(&self, group_id: GroupId, user_id: &str) -> RepoResult<Option<GroupMember>> {
        load_member(self.conn, group_id.to_string().as_str(), user_id)
    }

    fn add_member(&self, member: &GroupMember) -> RepoResult<AddMemberOutcome> {
        member.validate()?;
        if member.role != MemberRole::Member {
            return Err(RepoError::InvalidData(
                "only member rows can be added after group creation".to_string(),
            ));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let group_id = member.group_id.to_string();
        let Some(group) = load_group(&tx, group_id.as_str())? else {
            return Ok(AddMemberOutcome::GroupNotFound);
        };
        if !group.is_active {
            return Ok(AddMemberOutcome::GroupNotFound);
        }
        if load_member(&tx, group_id.as_str(), member.user_id.as_str())?.is_some() {
            return Ok(AddMemberOutcome::AlreadyMember);
        }
        if count_members(&tx, group_id.as_str())? >= group.max_members {
            return Ok(AddMemberOutcome::GroupFull {
                max_members: group.max_members,
            });
        }

        insert_member(&tx, member)?;
        recompute_member_count(&tx, group_id.as_str())?;
        let group = load_group(&tx, group_id.as_str())?.ok_or(RepoError::NotFound(member.group_id))?;
        tx.commit()?;
        Ok(AddMemberOutcome::Added { group })
    }

    fn remove_member(&self, group_id: GroupId, user_id: &str) -> RepoResult<RemoveMemberOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let group_id_text = group_id.to_string();
        match load_group(&tx, group_id_text.as_str())? {
            Some(group) if group.is_active => {}
            _ => return Ok(RemoveMemberOutcome::GroupNotFound),
        }

        match load_member(&tx, group_id_text.as_str(), user_id)? {
            None => return Ok(RemoveMemberOutcome::NotAMember),
            Some(member) if member.is_leader() => {
                return Ok(RemoveMemberOutcome::LeaderProtected)
            }
            Some(_) => {}
        }

        tx.execute(
            "DELETE FROM group_members
             WHERE group_id = ?1
               AND user_id = ?2
               AND role = 'member';",
            params![group_id_text.as_str(), user_id],
        )?;
        recompute_member_count(&tx, group_id_text.as_str())?;
        let group = load_group(&tx, group_id_text.as_str())?.ok_or(RepoError::NotFound(group_id))?;
        tx.commit()?;
        Ok(RemoveMemberOutcome::Removed { group })
    }
}

fn insert_member(conn: &Connection, member: &GroupMember) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO group_members (
            group_id,
            user_id,
            user_name,
            role,
            joined_at
        ) VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            member.group_id.to_string(),
            member.user_id.as_str(),
            member.user_name.as_str(),
            member.role.as_str(),
            member.joined_at,
        ],
    )?;
    Ok(())
}

fn count_members(conn: &Connection, group_id: &str) -> RepoResult<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM group_members WHERE group_id = ?1;",
        [group_id],
        |row| row.get(0),
    )?;
    to_u32(count, "COUNT(group_members)")
}

/// Rewrites `current_members` from the membership relation.
fn recompute_member_count(conn: &Connection, group_id: &str) -> RepoResult<()> {
    conn.execute(
        "UPDATE study_groups
         SET
            current_members = (
                SELECT COUNT(*)
                FROM group_members
                WHERE group_id = ?1
            ),
            updated_at = ?2
         WHERE id = ?1;",
        params![group_id, now_epoch_ms()],
    )?;
    Ok(())
}

fn load_group(conn: &Connection, group_id: &str) -> RepoResult<Option<StudyGroup>> {
    let mut stmt = conn.prepare(&format!("{GROUP_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([group_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_group_row(row)?));
    }
    Ok(None)
}

fn load_member(conn: &Connection, group_id: &str, user_id: &str) -> RepoResult<Option<GroupMember>> {
    let member = conn
        .query_row(
            &format!("{MEMBER_SELECT_SQL} WHERE group_id = ?1 AND user_id = ?2;"),
            params![group_id, user_id],
            |row| Ok(parse_member_row(row)),
        )
        .optional()?;
    member.transpose()
}

fn load_members(conn: &Connection, group_id: &str) -> RepoResult<Vec<GroupMember>> {
    let mut stmt = conn.prepare(&format!(
        "{MEMBER_SELECT_SQL}
         WHERE group_id = ?1
         ORDER BY
            CASE role WHEN 'leader' THEN 0 ELSE 1 END ASC,
            joined_at ASC,
            rowid ASC;"
    ))?;
    let mut rows = stmt.query([group_id])?;
    let mut members = Vec::new();
    while let Some(row) = rows.next()? {
        members.push(parse_member_row(row)?);
    }
    Ok(members)
}

fn parse_group_row(row: &Row<'_>) -> RepoResult<StudyGroup> {
    let id_text: String = row.get("id")?;
    let category_text: String = row.get("category")?;
    let category = GroupCategory::parse(&category_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid category `{category_text}` in study_groups.category"
        ))
    })?;

    let is_active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_active value `{other}` in study_groups.is_active"
            )));
        }
    };

    Ok(StudyGroup {
        id: parse_uuid(&id_text, "study_groups.id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        category,
        leader_id: row.get("leader_id")?,
        max_members: to_u32(row.get("max_members")?, "study_groups.max_members")?,
        current_members: to_u32(row.get("current_members")?, "study_groups.current_members")?,
        is_active,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<GroupMember> {
    let group_id_text: String = row.get("group_id")?;
    let role_text: String = row.get("role")?;
    let role = MemberRole::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in group_members.role"))
    })?;

    Ok(GroupMember {
        group_id: parse_uuid(&group_id_text, "group_members.group_id")?,
        user_id: row.get("user_id")?,
        user_name: row.get("user_name")?,
        role,
        joined_at: row.get("joined_at")?,
    })
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn to_u32(value: i64, column: &'static str) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid count `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
