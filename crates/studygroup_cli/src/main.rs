//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `studygroup_core` linkage.
//! - Wire config, logging, storage and services end to end for `demo`.
//!
//! Usage: `studygroup_cli [ping|version|demo]` (default `demo`).

use log::info;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use studygroup_core::{
    dispatcher_from_config, init_logging, open_db, open_db_in_memory, AttendanceService,
    CoordinatorConfig, CreateGroupRequest, CreateMeetingRequest, GroupService, JoinResult,
    MeetingService, MembershipService, SqliteAttendanceRepository, SqliteGroupRepository,
    SqliteMeetingRepository,
};

const DEMO_MEETING_OFFSET_MS: i64 = 7 * 24 * 60 * 60 * 1000;

fn main() -> ExitCode {
    let command = std::env::args().nth(1).unwrap_or_else(|| "demo".to_string());
    match command.as_str() {
        "ping" => {
            println!("studygroup_core ping={}", studygroup_core::ping());
            ExitCode::SUCCESS
        }
        "version" => {
            println!(
                "studygroup_core version={}",
                studygroup_core::core_version()
            );
            ExitCode::SUCCESS
        }
        "demo" => match run_demo() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("demo failed: {err}");
                ExitCode::FAILURE
            }
        },
        other => {
            eprintln!("unknown command `{other}`; expected ping|version|demo");
            ExitCode::from(2)
        }
    }
}

fn run_demo() -> Result<(), Box<dyn Error>> {
    let config = CoordinatorConfig::from_env()?;
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir)?;
    }

    let conn = match config.db_path.as_deref() {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let notifier = dispatcher_from_config(&config)?;

    let groups = GroupService::new(SqliteGroupRepository::try_new(&conn)?)
        .with_default_page_size(config.page_size_default);
    let membership = MembershipService::new(SqliteGroupRepository::try_new(&conn)?, Arc::clone(&notifier));
    let meetings = MeetingService::new(
        SqliteMeetingRepository::try_new(&conn)?,
        SqliteGroupRepository::try_new(&conn)?,
        notifier,
    );
    let attendance = AttendanceService::new(SqliteAttendanceRepository::try_new(&conn)?);

    let group = groups.create_group(&CreateGroupRequest {
        name: "Weekly algorithm drills".to_string(),
        description: "Two problems per session, reviewed together.".to_string(),
        category: "algorithm".to_string(),
        max_members: 4,
        leader_id: "demo-leader".to_string(),
        leader_name: "Demo Leader".to_string(),
    })?;
    let joined = JoinResult::from_result(
        membership.join(group.id, "demo-member", "Demo Member"),
        "joined the group",
    );
    println!("{}", serde_json::to_string(&joined)?);

    let meeting = meetings.create_meeting(
        group.id,
        &CreateMeetingRequest {
            title: "Kickoff".to_string(),
            date: Some(group.created_at + DEMO_MEETING_OFFSET_MS),
            location: Some("Library room 2".to_string()),
            exclude_user_id: Some(group.leader_id.clone()),
            ..CreateMeetingRequest::default()
        },
    )?;
    attendance.set_attendance(meeting.id, "demo-member", "Demo Member", "attending")?;

    let detail = groups.get_group(group.id)?;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    println!(
        "{}",
        serde_json::to_string_pretty(&meetings.list_meetings(group.id)?)?
    );
    info!("event=demo_done module=cli status=ok group_id={}", group.id);
    Ok(())
}
