//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for groups, meetings and
//!   attendance.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes run model `validate()` before persistence.
//! - Repository APIs return semantic outcomes (`NotFound`, `GroupFull`, ...)
//!   in addition to DB transport errors.
//! - SQLite and in-memory implementations report identical outcomes for the
//!   same sequence of calls.

pub mod attendance_repo;
pub mod group_repo;
pub mod meeting_repo;
pub mod memory;
mod schema;
