//! Notification outbox entity model.
//!
//! Rows are written by the reschedule workflow and drained by
//! [`OutboxDispatcher`](crate::OutboxDispatcher). The payload is stored as a
//! MessagePack blob so the dispatcher can decode it without joining back to
//! the school tables.

use sea_orm::entity::prelude::*;

/// Sea-ORM entity model representing one queued notification.
///
/// # Database Schema
///
/// | Column       | Type               | Description                            |
/// |--------------|--------------------|----------------------------------------|
/// | id           | TEXT (Primary Key) | Message ID                             |
/// | kind         | TEXT               | Message kind, e.g. `reschedule_request`|
/// | payload      | BYTEA              | MessagePack serialized payload         |
/// | attempts     | INTEGER            | Delivery attempts so far               |
/// | last_error   | TEXT NULL          | Error of the latest failed attempt     |
/// | created_at   | TIMESTAMPTZ        | Enqueue time                           |
/// | delivered_at | TIMESTAMPTZ NULL   | Set once delivery succeeded            |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notification_outbox")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    pub kind: String,
    pub payload: Vec<u8>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub delivered_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
