use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Product::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Product::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Product::DisplayName).text().not_null())
                    .col(ColumnDef::new(Product::Format).string_len(16).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Cohort::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Cohort::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Cohort::Nickname).text().null())
                    .col(ColumnDef::new(Cohort::DisplayName).text().null())
                    .col(ColumnDef::new(Cohort::StartDate).date().null())
                    .col(ColumnDef::new(Cohort::ProductId).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cohort_product")
                            .from(Cohort::Table, Cohort::ProductId)
                            .to(Product::Table, Product::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Student::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Student::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Student::UserId).text().not_null().unique_key())
                    .col(ColumnDef::new(Student::FirstName).text().null())
                    .col(ColumnDef::new(Student::FullName).text().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Teacher::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Teacher::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Teacher::Name).text().null())
                    .col(ColumnDef::new(Teacher::Email).text().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Enrollment::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Enrollment::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Enrollment::StudentId).text().not_null())
                    .col(ColumnDef::new(Enrollment::CohortId).text().not_null())
                    .col(ColumnDef::new(Enrollment::Status).string_len(32).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollment_student")
                            .from(Enrollment::Table, Enrollment::StudentId)
                            .to(Student::Table, Student::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollment_cohort")
                            .from(Enrollment::Table, Enrollment::CohortId)
                            .to(Cohort::Table, Cohort::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WeeklySession::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(WeeklySession::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(WeeklySession::CohortId).text().not_null())
                    .col(ColumnDef::new(WeeklySession::DayOfWeek).text().null())
                    .col(ColumnDef::new(WeeklySession::StartTime).text().null())
                    .col(ColumnDef::new(WeeklySession::EndTime).text().null())
                    .col(ColumnDef::new(WeeklySession::TeacherId).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_weekly_session_cohort")
                            .from(WeeklySession::Table, WeeklySession::CohortId)
                            .to(Cohort::Table, Cohort::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_weekly_session_teacher")
                            .from(WeeklySession::Table, WeeklySession::TeacherId)
                            .to(Teacher::Table, Teacher::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WeeklySession::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Enrollment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Teacher::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Student::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Cohort::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Product::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(super) enum Product {
    Table,
    Id,
    DisplayName,
    Format,
}

#[derive(DeriveIden)]
pub(super) enum Cohort {
    Table,
    Id,
    Nickname,
    DisplayName,
    StartDate,
    ProductId,
}

#[derive(DeriveIden)]
pub(super) enum Student {
    Table,
    Id,
    UserId,
    FirstName,
    FullName,
}

#[derive(DeriveIden)]
enum Teacher {
    Table,
    Id,
    Name,
    Email,
}

#[derive(DeriveIden)]
enum Enrollment {
    Table,
    Id,
    StudentId,
    CohortId,
    Status,
}

#[derive(DeriveIden)]
enum WeeklySession {
    Table,
    Id,
    CohortId,
    DayOfWeek,
    StartTime,
    EndTime,
    TeacherId,
}
