//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep the caller layer decoupled from storage and notification details.

pub mod attendance_service;
pub mod error;
pub mod group_service;
pub mod meeting_service;
pub mod membership_service;
