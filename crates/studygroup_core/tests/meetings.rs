use rusqlite::Connection;
use std::sync::Arc;
use studygroup_core::db::open_db_in_memory;
use studygroup_core::{
    AttendanceService, CreateGroupRequest, CreateMeetingRequest, ErrorKind, GroupRepository,
    GroupService, MeetingPatch, MeetingService, MembershipService, NotificationKind,
    RecordingNotificationDispatcher, SqliteAttendanceRepository, SqliteGroupRepository,
    SqliteMeetingRepository, StudyGroup,
};

fn group_with_member(conn: &Connection) -> StudyGroup {
    let group = GroupService::new(SqliteGroupRepository::try_new(conn).unwrap())
        .create_group(&CreateGroupRequest {
            name: "Portfolio review".to_string(),
            description: "critique sessions".to_string(),
            category: "portfolio".to_string(),
            max_members: 4,
            leader_id: "L".to_string(),
            leader_name: "Leader".to_string(),
        })
        .unwrap();
    MembershipService::new(
        SqliteGroupRepository::try_new(conn).unwrap(),
        Arc::new(RecordingNotificationDispatcher::new()),
    )
    .join(group.id, "U1", "User One")
    .unwrap()
}

fn meeting_service<'c>(
    conn: &'c Connection,
    notifier: Arc<RecordingNotificationDispatcher>,
) -> MeetingService<SqliteMeetingRepository<'c>, SqliteGroupRepository<'c>> {
    MeetingService::new(
        SqliteMeetingRepository::try_new(conn).unwrap(),
        SqliteGroupRepository::try_new(conn).unwrap(),
        notifier,
    )
}

fn kickoff(date: i64) -> CreateMeetingRequest {
    CreateMeetingRequest {
        title: "Kickoff".to_string(),
        date: Some(date),
        ..CreateMeetingRequest::default()
    }
}

#[test]
fn scenario_c_meeting_creation_notifies_every_member() {
    let conn = open_db_in_memory().unwrap();
    let group = group_with_member(&conn);
    let notifier = Arc::new(RecordingNotificationDispatcher::new());
    let service = meeting_service(&conn, notifier.clone());

    let meeting = service
        .create_meeting(group.id, &kickoff(1_700_000_000_000))
        .unwrap();

    assert_eq!(meeting.title, "Kickoff");
    assert_eq!(meeting.scheduled_at, 1_700_000_000_000);
    assert_eq!(meeting.group_id, group.id);

    let sent = notifier.sent();
    assert_eq!(notifier.recipients(), vec!["L".to_string(), "U1".to_string()]);
    assert!(sent
        .iter()
        .all(|notification| notification.kind == NotificationKind::MeetingCreated));
    assert_eq!(
        sent[0].action_url.as_deref(),
        Some(format!("/groups/{}/meetings", group.id).as_str())
    );
    assert_eq!(sent[0].related_id, Some(meeting.id.to_string()));
}

#[test]
fn excluded_actor_is_not_notified() {
    let conn = open_db_in_memory().unwrap();
    let group = group_with_member(&conn);
    let notifier = Arc::new(RecordingNotificationDispatcher::new());
    let service = meeting_service(&conn, notifier.clone());

    let mut request = kickoff(10);
    request.exclude_user_id = Some("L".to_string());
    service.create_meeting(group.id, &request).unwrap();

    assert_eq!(notifier.recipients(), vec!["U1".to_string()]);
}

#[test]
fn create_meeting_requires_title_date_and_active_group() {
    let conn = open_db_in_memory().unwrap();
    let group = group_with_member(&conn);
    let notifier = Arc::new(RecordingNotificationDispatcher::new());
    let service = meeting_service(&conn, notifier.clone());

    let mut untitled = kickoff(10);
    untitled.title = "  ".to_string();
    let err = service.create_meeting(group.id, &untitled).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.to_string(), "meeting title must not be blank");

    let mut undated = kickoff(10);
    undated.date = None;
    let err = service.create_meeting(group.id, &undated).unwrap_err();
    assert_eq!(err.to_string(), "meeting date is required");

    let missing = service
        .create_meeting(uuid::Uuid::new_v4(), &kickoff(10))
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);

    assert!(notifier.sent().is_empty());
    assert!(service.list_meetings(group.id).unwrap().is_empty());
}

#[test]
fn meetings_are_listed_by_date_with_attendee_ids() {
    let conn = open_db_in_memory().unwrap();
    let group = group_with_member(&conn);
    let service = meeting_service(&conn, Arc::new(RecordingNotificationDispatcher::new()));
    let attendance = AttendanceService::new(SqliteAttendanceRepository::try_new(&conn).unwrap());

    let late = service.create_meeting(group.id, &kickoff(3_000)).unwrap();
    let early = service.create_meeting(group.id, &kickoff(1_000)).unwrap();
    attendance
        .set_attendance(late.id, "U1", "User One", "maybe")
        .unwrap();

    let listed = service.list_meetings(group.id).unwrap();
    let ids: Vec<_> = listed.iter().map(|meeting| meeting.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);
    assert!(listed[0].attendees.is_empty());
    assert_eq!(listed[1].attendees, vec!["U1".to_string()]);
}

#[test]
fn update_meeting_patches_selected_fields() {
    let conn = open_db_in_memory().unwrap();
    let group = group_with_member(&conn);
    let service = meeting_service(&conn, Arc::new(RecordingNotificationDispatcher::new()));
    let mut request = kickoff(1_000);
    request.location = Some("Room 1".to_string());
    request.description = Some("bring laptops".to_string());
    let meeting = service.create_meeting(group.id, &request).unwrap();

    let updated = service
        .update_meeting(
            meeting.id,
            &MeetingPatch {
                scheduled_at: Some(2_000),
                location: Some(None),
                ..MeetingPatch::default()
            },
        )
        .unwrap()
        .unwrap();

    assert_eq!(updated.scheduled_at, 2_000);
    assert_eq!(updated.location, None);
    assert_eq!(updated.description.as_deref(), Some("bring laptops"));
    assert_eq!(updated.title, "Kickoff");

    let blank_title = service
        .update_meeting(
            meeting.id,
            &MeetingPatch {
                title: Some(" ".to_string()),
                ..MeetingPatch::default()
            },
        )
        .unwrap_err();
    assert_eq!(blank_title.kind(), ErrorKind::Validation);
}

#[test]
fn update_or_delete_missing_meeting_reports_absence() {
    let conn = open_db_in_memory().unwrap();
    let service = meeting_service(&conn, Arc::new(RecordingNotificationDispatcher::new()));
    let missing = uuid::Uuid::new_v4();

    let updated = service
        .update_meeting(
            missing,
            &MeetingPatch {
                title: Some("Retro".to_string()),
                ..MeetingPatch::default()
            },
        )
        .unwrap();
    assert!(updated.is_none());
    assert!(service
        .update_meeting(missing, &MeetingPatch::default())
        .unwrap()
        .is_none());
    assert!(!service.delete_meeting(missing).unwrap());
}

#[test]
fn delete_meeting_cascades_attendance() {
    let conn = open_db_in_memory().unwrap();
    let group = group_with_member(&conn);
    let service = meeting_service(&conn, Arc::new(RecordingNotificationDispatcher::new()));
    let attendance = AttendanceService::new(SqliteAttendanceRepository::try_new(&conn).unwrap());
    let meeting = service.create_meeting(group.id, &kickoff(1_000)).unwrap();
    attendance
        .set_attendance(meeting.id, "U1", "User One", "attending")
        .unwrap();

    assert!(service.delete_meeting(meeting.id).unwrap());

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM meeting_attendees;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn meetings_survive_group_soft_delete() {
    let conn = open_db_in_memory().unwrap();
    let group = group_with_member(&conn);
    let service = meeting_service(&conn, Arc::new(RecordingNotificationDispatcher::new()));
    service.create_meeting(group.id, &kickoff(1_000)).unwrap();

    SqliteGroupRepository::try_new(&conn)
        .unwrap()
        .soft_delete_group(group.id)
        .unwrap();

    assert_eq!(service.list_meetings(group.id).unwrap().len(), 1);
    let err = service
        .create_meeting(group.id, &kickoff(2_000))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
