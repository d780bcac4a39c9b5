//! Database entity models for reschedule-seaorm.
//!
//! This module contains the Sea-ORM entity definitions for every table the
//! crate reads or writes. The school tables (`student`, `teacher`, `product`,
//! `cohort`, `enrollment`, `weekly_session`) are owned by the wider platform and
//! only read here; `reschedule_request` and `notification_outbox` are written
//! by the reschedule workflow.

/// Language product a cohort is sold as (private, group, hybrid).
pub mod product;

/// A group of students sharing a schedule and level.
pub mod cohort;

/// A student's enrollment in one cohort.
pub mod enrollment;

/// Recurring weekly class slot of a cohort.
pub mod weekly_session;

pub mod student;
pub mod teacher;

/// Reschedule requests submitted by students.
pub mod reschedule_request;

/// Pending notifications waiting to be delivered.
pub mod notification_outbox;
