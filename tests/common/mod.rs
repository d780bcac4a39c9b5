#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reschedule_seaorm::entity::enrollment::EnrollmentStatus;
use reschedule_seaorm::entity::product::ProductFormat;
use reschedule_seaorm::entity::{cohort, enrollment, product, student, teacher, weekly_session};
use reschedule_seaorm::migration::{Migrator, MigratorTrait};
use reschedule_seaorm::{
    CallerIdentity, CreateRescheduleRequest, FixedClock, Notifier, NotifyError,
    RescheduleNotification, RescheduleService,
};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use uuid::Uuid;

pub const PRIVATE_COHORT: &str = "cohort_private";
pub const GROUP_COHORT: &str = "cohort_group";
pub const UNSTAFFED_COHORT: &str = "cohort_unstaffed";

pub const STUDENT_A: &str = "stu_a";
pub const STUDENT_B: &str = "stu_b";
pub const STUDENT_DROPPED: &str = "stu_dropped";
pub const USER_A: &str = "user_a";
pub const USER_B: &str = "user_b";
pub const USER_DROPPED: &str = "user_dropped";
pub const USER_WITHOUT_STUDENT: &str = "user_ghost";

/// 2025-01-01 was a Wednesday.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub async fn setup_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    // A single connection keeps every query on the same in-memory database.
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let conn = Database::connect(opt).await.expect("connect to sqlite");
    Migrator::up(&conn, None).await.expect("run migrations");
    conn
}

/// A seeded SQLite database file that several pooled connections share.
pub struct FileDb {
    pub conn: DatabaseConnection,
    path: PathBuf,
}

impl FileDb {
    pub async fn seeded(max_connections: u32) -> Self {
        let path = std::env::temp_dir().join(format!("reschedule-{}.db", Uuid::new_v4()));
        let mut opt = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
        opt.max_connections(max_connections).sqlx_logging(false);
        let conn = Database::connect(opt).await.expect("connect to sqlite file");
        Migrator::up(&conn, None).await.expect("run migrations");
        seed(&conn).await;
        Self { conn, path }
    }

    pub async fn remove(self) {
        self.conn.close().await.expect("close sqlite file");
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

/// Migrated database with two products, three cohorts, a few students and a
/// weekly timetable for the private cohort:
///
/// - Tuesday 10:00-11:00 with Ana (ana@school.test)
/// - Thursday 18:00:00-19:00:00, unstaffed
pub async fn seeded_db() -> DatabaseConnection {
    let conn = setup_db().await;
    seed(&conn).await;
    conn
}

async fn seed(conn: &DatabaseConnection) {

    for (id, format) in [
        ("prod_private", ProductFormat::Private),
        ("prod_group", ProductFormat::Group),
    ] {
        product::ActiveModel {
            id: Set(id.into()),
            display_name: Set(format!("{id} product")),
            format: Set(format),
        }
        .insert(conn)
        .await
        .expect("insert product");
    }

    for (id, nickname, product_id) in [
        (PRIVATE_COHORT, Some("A1 Private - Lena"), "prod_private"),
        (GROUP_COHORT, None, "prod_group"),
        (UNSTAFFED_COHORT, None, "prod_private"),
    ] {
        cohort::ActiveModel {
            id: Set(id.into()),
            nickname: Set(nickname.map(Into::into)),
            display_name: Set(Some(format!("{id} display"))),
            start_date: Set(None),
            product_id: Set(Some(product_id.into())),
        }
        .insert(conn)
        .await
        .expect("insert cohort");
    }

    teacher::ActiveModel {
        id: Set("teacher_ana".into()),
        name: Set(Some("Ana".into())),
        email: Set(Some("ana@school.test".into())),
    }
    .insert(conn)
    .await
    .expect("insert teacher");

    for (id, user_id, full_name) in [
        (STUDENT_A, USER_A, "Lena Schmidt"),
        (STUDENT_B, USER_B, "Tom Berger"),
        (STUDENT_DROPPED, USER_DROPPED, "Max Weber"),
    ] {
        student::ActiveModel {
            id: Set(id.into()),
            user_id: Set(user_id.into()),
            first_name: Set(full_name.split(' ').next().map(Into::into)),
            full_name: Set(Some(full_name.into())),
        }
        .insert(conn)
        .await
        .expect("insert student");
    }

    for (id, student_id, cohort_id, status) in [
        ("enr_a_private", STUDENT_A, PRIVATE_COHORT, EnrollmentStatus::Paid),
        ("enr_a_group", STUDENT_A, GROUP_COHORT, EnrollmentStatus::Paid),
        (
            "enr_a_unstaffed",
            STUDENT_A,
            UNSTAFFED_COHORT,
            EnrollmentStatus::WelcomePackageSent,
        ),
        ("enr_b_private", STUDENT_B, PRIVATE_COHORT, EnrollmentStatus::WelcomePackageSent),
        ("enr_dropped", STUDENT_DROPPED, PRIVATE_COHORT, EnrollmentStatus::Dropped),
    ] {
        enrollment::ActiveModel {
            id: Set(id.into()),
            student_id: Set(student_id.into()),
            cohort_id: Set(cohort_id.into()),
            status: Set(status),
        }
        .insert(conn)
        .await
        .expect("insert enrollment");
    }

    for (id, cohort_id, day, start, end, teacher_id) in [
        ("ws_tue", PRIVATE_COHORT, "Tuesday", "10:00", "11:00", Some("teacher_ana")),
        ("ws_thu", PRIVATE_COHORT, "thursday", "18:00:00", "19:00:00", None),
        ("ws_unstaffed", UNSTAFFED_COHORT, "Monday", "09:00", "10:00", None),
    ] {
        weekly_session::ActiveModel {
            id: Set(id.into()),
            cohort_id: Set(cohort_id.into()),
            day_of_week: Set(Some(day.into())),
            start_time: Set(Some(start.into())),
            end_time: Set(Some(end.into())),
            teacher_id: Set(teacher_id.map(Into::into)),
        }
        .insert(conn)
        .await
        .expect("insert weekly session");
    }
}

pub async fn set_cohort_start(conn: &DatabaseConnection, cohort_id: &str, start: NaiveDate) {
    cohort::ActiveModel {
        id: Set(cohort_id.into()),
        start_date: Set(Some(start)),
        ..Default::default()
    }
    .update(conn)
    .await
    .expect("update cohort start");
}

pub fn service(conn: &DatabaseConnection) -> RescheduleService {
    RescheduleService::new(conn.clone()).with_clock(FixedClock::at(now()))
}

pub fn caller(user_id: &str) -> CallerIdentity {
    CallerIdentity::user(user_id)
}

pub fn request_for(cohort_id: &str, class_date: DateTime<Utc>) -> CreateRescheduleRequest {
    CreateRescheduleRequest {
        cohort_id: cohort_id.into(),
        original_class_date: class_date.to_rfc3339(),
        proposed_datetime: "Any evening later that week".into(),
        reason: Some("Work trip".into()),
    }
}

/// Records delivered notifications; fails while `failing` is set.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<RescheduleNotification>>,
    pub failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn failing() -> Arc<Self> {
        let notifier = Self::default();
        *notifier.failing.lock().unwrap() = true;
        Arc::new(notifier)
    }

    pub fn sent(&self) -> Vec<RescheduleNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_reschedule_request_notification(
        &self,
        notification: &RescheduleNotification,
    ) -> Result<(), NotifyError> {
        if *self.failing.lock().unwrap() {
            return Err(NotifyError::Delivery("smtp unavailable".into()));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
