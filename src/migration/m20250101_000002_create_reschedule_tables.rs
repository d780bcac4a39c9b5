use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_school_tables::{Cohort, Student};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// At most one non-cancelled request per student, cohort and class occurrence.
const ACTIVE_REQUEST_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS \
     uq_reschedule_request_active_occurrence \
     ON reschedule_request (student_id, cohort_id, original_class_date) \
     WHERE status <> 'cancelled'";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RescheduleRequest::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RescheduleRequest::Id)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RescheduleRequest::StudentId).text().not_null())
                    .col(ColumnDef::new(RescheduleRequest::CohortId).text().not_null())
                    .col(
                        ColumnDef::new(RescheduleRequest::OriginalClassDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RescheduleRequest::ProposedDatetime)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RescheduleRequest::Reason).text().null())
                    .col(
                        ColumnDef::new(RescheduleRequest::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(RescheduleRequest::AdminNotes).text().null())
                    .col(
                        ColumnDef::new(RescheduleRequest::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RescheduleRequest::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reschedule_request_student")
                            .from(RescheduleRequest::Table, RescheduleRequest::StudentId)
                            .to(Student::Table, Student::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reschedule_request_cohort")
                            .from(RescheduleRequest::Table, RescheduleRequest::CohortId)
                            .to(Cohort::Table, Cohort::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reschedule_request_student_created")
                    .table(RescheduleRequest::Table)
                    .col(RescheduleRequest::StudentId)
                    .col(RescheduleRequest::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Partial indexes are not expressible through the index builder.
        manager
            .get_connection()
            .execute_unprepared(ACTIVE_REQUEST_INDEX)
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NotificationOutbox::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationOutbox::Id)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NotificationOutbox::Kind).text().not_null())
                    .col(ColumnDef::new(NotificationOutbox::Payload).binary().not_null())
                    .col(
                        ColumnDef::new(NotificationOutbox::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(NotificationOutbox::LastError).text().null())
                    .col(
                        ColumnDef::new(NotificationOutbox::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationOutbox::DeliveredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationOutbox::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RescheduleRequest::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RescheduleRequest {
    Table,
    Id,
    StudentId,
    CohortId,
    OriginalClassDate,
    ProposedDatetime,
    Reason,
    Status,
    AdminNotes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum NotificationOutbox {
    Table,
    Id,
    Kind,
    Payload,
    Attempts,
    LastError,
    CreatedAt,
    DeliveredAt,
}
