//! In-memory implementation of the storage contracts.
//!
//! # Responsibility
//! - Back services in tests and demos without a SQLite file.
//! - Mirror SQLite ordering and outcome semantics so either store can be
//!   swapped behind the same service.
//!
//! # Invariants
//! - All state lives behind one `Mutex`; every operation holds it for its
//!   whole check-then-write sequence.
//! - Insertion order is tracked with a monotonically increasing sequence that
//!   stands in for SQLite `rowid`.

use crate::model::group::{
    GroupCategory, GroupId, GroupMember, GroupPatch, MemberRole, StudyGroup,
};
use crate::model::meeting::{Meeting, MeetingAttendee, MeetingId, MeetingPatch, MeetingValidationError};
use crate::model::now_epoch_ms;
use crate::repo::attendance_repo::AttendanceRepository;
use crate::repo::group_repo::{
    AddMemberOutcome, GroupListQuery, GroupRepository, RemoveMemberOutcome, RepoError, RepoResult,
    UpdateGroupOutcome,
};
use crate::repo::meeting_repo::MeetingRepository;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct Sequenced<T> {
    seq: u64,
    value: T,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_seq: u64,
    groups: HashMap<GroupId, Sequenced<StudyGroup>>,
    members: HashMap<GroupId, Vec<Sequenced<GroupMember>>>,
    meetings: HashMap<MeetingId, Sequenced<Meeting>>,
    attendees: HashMap<MeetingId, Vec<Sequenced<MeetingAttendee>>>,
}

impl MemoryState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn member_count(&self, group_id: GroupId) -> RepoResult<u32> {
        let count = self.members.get(&group_id).map_or(0, Vec::len);
        u32::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("invalid member count `{count}`")))
    }

    /// Rewrites `current_members` and returns the refreshed group.
    fn recompute_member_count(&mut self, group_id: GroupId) -> RepoResult<StudyGroup> {
        let count = self.member_count(group_id)?;
        let group = self
            .groups
            .get_mut(&group_id)
            .ok_or(RepoError::NotFound(group_id))?;
        group.value.current_members = count;
        group.value.updated_at = now_epoch_ms();
        Ok(group.value.clone())
    }

    fn active_group(&self, group_id: GroupId) -> Option<&StudyGroup> {
        self.groups
            .get(&group_id)
            .map(|group| &group.value)
            .filter(|group| group.is_active)
    }

    fn attendee_ids(&self, meeting_id: MeetingId) -> Vec<String> {
        self.attendees
            .get(&meeting_id)
            .map(|rows| rows.iter().map(|row| row.value.user_id.clone()).collect())
            .unwrap_or_default()
    }
}

/// Mutex-guarded store implementing group, meeting and attendance contracts.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| RepoError::LockPoisoned)
    }
}

impl GroupRepository for InMemoryStore {
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

        let mut state = self.lock()?;
        if state.groups.contains_key(&group.id) {
            return Err(RepoError::InvalidData(format!(
                "group `{}` already exists",
                group.id
            )));
        }

        let mut stored = group.clone();
        stored.current_members = 0;
        let group_seq = state.next_seq();
        state.groups.insert(
            group.id,
            Sequenced {
                seq: group_seq,
                value: stored,
            },
        );
        let leader_seq = state.next_seq();
        state.members.insert(
            group.id,
            vec![Sequenced {
                seq: leader_seq,
                value: leader.clone(),
            }],
        );
        state.recompute_member_count(group.id)
    }

    fn get_group(&self, id: GroupId, include_inactive: bool) -> RepoResult<Option<StudyGroup>> {
        let state = self.lock()?;
        Ok(state
            .groups
            .get(&id)
            .map(|group| group.value.clone())
            .filter(|group| include_inactive || group.is_active))
    }

    fn update_group(&self, id: GroupId, patch: &GroupPatch) -> RepoResult<UpdateGroupOutcome> {
        let mut state = self.lock()?;
        if state.active_group(id).is_none() {
            return Ok(UpdateGroupOutcome::GroupNotFound);
        }
        if let Some(max_members) = patch.max_members {
            let current_members = state.member_count(id)?;
            if max_members < current_members {
                return Ok(UpdateGroupOutcome::BelowMemberCount {
                    max_members,
                    current_members,
                });
            }
        }

        let group = state
            .groups
            .get_mut(&id)
            .map(|group| &mut group.value)
            .ok_or(RepoError::NotFound(id))?;

        if let Some(name) = &patch.name {
            group.name = name.clone();
        }
        if let Some(description) = &patch.description {
            group.description = description.clone();
        }
        if let Some(max_members) = patch.max_members {
            group.max_members = max_members;
        }
        group.updated_at = now_epoch_ms();
        Ok(UpdateGroupOutcome::Updated(group.clone()))
    }

    fn list_groups(&self, query: &GroupListQuery) -> RepoResult<Vec<StudyGroup>> {
        let state = self.lock()?;
        let mut groups: Vec<&Sequenced<StudyGroup>> = state
            .groups
            .values()
            .filter(|group| group.value.is_active)
            .filter(|group| query.category.map_or(true, |c| group.value.category == c))
            .collect();
        groups.sort_by(|left, right| {
            right
                .value
                .created_at
                .cmp(&left.value.created_at)
                .then(right.seq.cmp(&left.seq))
        });
        Ok(groups
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .map(|group| group.value.clone())
            .collect())
    }

    fn count_groups(&self, category: Option<GroupCategory>) -> RepoResult<u64> {
        let state = self.lock()?;
        Ok(state
            .groups
            .values()
            .filter(|group| group.value.is_active)
            .filter(|group| category.map_or(true, |c| group.value.category == c))
            .count() as u64)
    }

    fn soft_delete_group(&self, id: GroupId) -> RepoResult<bool> {
        let mut state = self.lock()?;
        match state.groups.get_mut(&id) {
            Some(group) if group.value.is_active => {
                group.value.is_active = false;
                group.value.updated_at = now_epoch_ms();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn list_members(&self, group_id: GroupId) -> RepoResult<Vec<GroupMember>> {
        let state = self.lock()?;
        let mut members: Vec<&Sequenced<GroupMember>> = state
            .members
            .get(&group_id)
            .map(|rows| rows.iter().collect())
            .unwrap_or_default();
        members.sort_by(|left, right| {
            right
                .value
                .is_leader()
                .cmp(&left.value.is_leader())
                .then(left.value.joined_at.cmp(&right.value.joined_at))
                .then(left.seq.cmp(&right.seq))
        });
        Ok(members.into_iter().map(|row| row.value.clone()).collect())
    }

    fn get_member(&self, group_id: GroupId, user_id: &str) -> RepoResult<Option<GroupMember>> {
        let state = self.lock()?;
        Ok(state.members.get(&group_id).and_then(|rows| {
            rows.iter()
                .find(|row| row.value.user_id == user_id)
                .map(|row| row.value.clone())
        }))
    }

    fn add_member(&self, member: &GroupMember) -> RepoResult<AddMemberOutcome> {
        member.validate()?;
        if member.role != MemberRole::Member {
            return Err(RepoError::InvalidData(
                "only member rows can be added after group creation".to_string(),
            ));
        }

        let mut state = self.lock()?;
        let Some(group) = state.active_group(member.group_id) else {
            return Ok(AddMemberOutcome::GroupNotFound);
        };
        let max_members = group.max_members;
        let already_member = state
            .members
            .get(&member.group_id)
            .is_some_and(|rows| rows.iter().any(|row| row.value.user_id == member.user_id));
        if already_member {
            return Ok(AddMemberOutcome::AlreadyMember);
        }
        if state.member_count(member.group_id)? >= max_members {
            return Ok(AddMemberOutcome::GroupFull { max_members });
        }

        let seq = state.next_seq();
        state
            .members
            .entry(member.group_id)
            .or_default()
            .push(Sequenced {
                seq,
                value: member.clone(),
            });
        let group = state.recompute_member_count(member.group_id)?;
        Ok(AddMemberOutcome::Added { group })
    }

    fn remove_member(&self, group_id: GroupId, user_id: &str) -> RepoResult<RemoveMemberOutcome> {
        let mut state = self.lock()?;
        if state.active_group(group_id).is_none() {
            return Ok(RemoveMemberOutcome::GroupNotFound);
        }

        let Some(rows) = state.members.get_mut(&group_id) else {
            return Ok(RemoveMemberOutcome::NotAMember);
        };
        let Some(index) = rows.iter().position(|row| row.value.user_id == user_id) else {
            return Ok(RemoveMemberOutcome::NotAMember);
        };
        if rows[index].value.is_leader() {
            return Ok(RemoveMemberOutcome::LeaderProtected);
        }
        rows.remove(index);

        let group = state.recompute_member_count(group_id)?;
        Ok(RemoveMemberOutcome::Removed { group })
    }
}

impl MeetingRepository for InMemoryStore {
    fn create_meeting(&self, meeting: &Meeting) -> RepoResult<MeetingId> {
        meeting.validate()?;
        let mut state = self.lock()?;
        if !state.groups.contains_key(&meeting.group_id) {
            return Err(RepoError::NotFound(meeting.group_id));
        }
        if state.meetings.contains_key(&meeting.id) {
            return Err(RepoError::InvalidData(format!(
                "meeting `{}` already exists",
                meeting.id
            )));
        }

        let mut stored = meeting.clone();
        stored.attendees.clear();
        let seq = state.next_seq();
        state.meetings.insert(meeting.id, Sequenced { seq, value: stored });
        Ok(meeting.id)
    }

    fn get_meeting(&self, id: MeetingId) -> RepoResult<Option<Meeting>> {
        let state = self.lock()?;
        Ok(state.meetings.get(&id).map(|row| {
            let mut meeting = row.value.clone();
            meeting.attendees = state.attendee_ids(id);
            meeting
        }))
    }

    fn update_meeting(&self, id: MeetingId, patch: &MeetingPatch) -> RepoResult<()> {
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(MeetingValidationError::EmptyTitle.into());
            }
        }

        let mut state = self.lock()?;
        let row = state.meetings.get_mut(&id).ok_or(RepoError::NotFound(id))?;
        patch.apply_to(&mut row.value);
        Ok(())
    }

    fn delete_meeting(&self, id: MeetingId) -> RepoResult<bool> {
        let mut state = self.lock()?;
        let removed = state.meetings.remove(&id).is_some();
        state.attendees.remove(&id);
        Ok(removed)
    }

    fn list_meetings(&self, group_id: GroupId) -> RepoResult<Vec<Meeting>> {
        let state = self.lock()?;
        let mut rows: Vec<&Sequenced<Meeting>> = state
            .meetings
            .values()
            .filter(|row| row.value.group_id == group_id)
            .collect();
        rows.sort_by(|left, right| {
            left.value
                .scheduled_at
                .cmp(&right.value.scheduled_at)
                .then(left.value.created_at.cmp(&right.value.created_at))
                .then(left.seq.cmp(&right.seq))
        });
        Ok(rows
            .into_iter()
            .map(|row| {
                let mut meeting = row.value.clone();
                meeting.attendees = state.attendee_ids(meeting.id);
                meeting
            })
            .collect())
    }
}

impl AttendanceRepository for InMemoryStore {
    fn upsert_attendance(&self, attendee: &MeetingAttendee) -> RepoResult<MeetingAttendee> {
        attendee.validate()?;
        let mut state = self.lock()?;
        if !state.meetings.contains_key(&attendee.meeting_id) {
            return Err(RepoError::NotFound(attendee.meeting_id));
        }

        let seq = state.next_seq();
        let rows = state.attendees.entry(attendee.meeting_id).or_default();
        match rows
            .iter_mut()
            .find(|row| row.value.user_id == attendee.user_id)
        {
            Some(existing) => {
                existing.value.user_name = attendee.user_name.clone();
                existing.value.status = attendee.status;
                existing.value.updated_at = attendee.updated_at;
            }
            None => rows.push(Sequenced {
                seq,
                value: attendee.clone(),
            }),
        }
        Ok(attendee.clone())
    }

    fn list_attendees(&self, meeting_id: MeetingId) -> RepoResult<Vec<MeetingAttendee>> {
        let state = self.lock()?;
        Ok(state
            .attendees
            .get(&meeting_id)
            .map(|rows| rows.iter().map(|row| row.value.clone()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::meeting::AttendanceStatus;

    fn seeded_group(store: &InMemoryStore, max_members: u32) -> StudyGroup {
        let group = StudyGroup::new("Graph drills", "weekly", GroupCategory::Algorithm, "lead", max_members);
        let leader = GroupMember::leader(group.id, "lead", "Lead");
        store
            .create_group(&group, &leader)
            .expect("group should be created")
    }

    #[test]
    fn create_group_counts_the_leader() {
        let store = InMemoryStore::new();
        let group = seeded_group(&store, 3);
        assert_eq!(group.current_members, 1);
    }

    #[test]
    fn add_member_stops_at_capacity() {
        let store = InMemoryStore::new();
        let group = seeded_group(&store, 2);

        let first = store
            .add_member(&GroupMember::member(group.id, "u1", "U1"))
            .expect("add should succeed");
        let refreshed = match first {
            AddMemberOutcome::Added { group } => group,
            other => panic!("expected Added, got {other:?}"),
        };
        assert_eq!(refreshed.current_members, 2);

        let second = store
            .add_member(&GroupMember::member(group.id, "u2", "U2"))
            .expect("add should succeed");
        assert_eq!(second, AddMemberOutcome::GroupFull { max_members: 2 });
    }

    #[test]
    fn update_cannot_drop_cap_below_live_count() {
        let store = InMemoryStore::new();
        let group = seeded_group(&store, 4);
        for user in ["u1", "u2"] {
            store
                .add_member(&GroupMember::member(group.id, user, user))
                .expect("add should succeed");
        }

        let patch = GroupPatch {
            max_members: Some(2),
            ..GroupPatch::default()
        };
        let outcome = store.update_group(group.id, &patch).expect("update should run");
        assert_eq!(
            outcome,
            UpdateGroupOutcome::BelowMemberCount {
                max_members: 2,
                current_members: 3,
            }
        );

        let stored = store
            .get_group(group.id, false)
            .expect("get should succeed")
            .expect("group should exist");
        assert_eq!(stored.max_members, 4);
    }

    #[test]
    fn remove_member_returns_refreshed_group() {
        let store = InMemoryStore::new();
        let group = seeded_group(&store, 3);
        store
            .add_member(&GroupMember::member(group.id, "u1", "U1"))
            .expect("add should succeed");

        let outcome = store.remove_member(group.id, "u1").expect("remove should run");
        let refreshed = match outcome {
            RemoveMemberOutcome::Removed { group } => group,
            other => panic!("expected Removed, got {other:?}"),
        };
        assert_eq!(refreshed.current_members, 1);
        assert!(refreshed.is_active);
    }

    #[test]
    fn upsert_attendance_replaces_existing_row() {
        let store = InMemoryStore::new();
        let group = seeded_group(&store, 3);
        let meeting = Meeting::new(group.id, "Kickoff", 10);
        store.create_meeting(&meeting).expect("meeting should be created");

        for status in [AttendanceStatus::Maybe, AttendanceStatus::Attending] {
            store
                .upsert_attendance(&MeetingAttendee::new(meeting.id, "u1", "U1", status))
                .expect("upsert should succeed");
        }

        let rows = store.list_attendees(meeting.id).expect("list should succeed");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, AttendanceStatus::Attending);
    }
}
