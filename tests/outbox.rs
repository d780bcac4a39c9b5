mod common;

use std::sync::Arc;

use common::*;
use reschedule_seaorm::entity::notification_outbox;
use reschedule_seaorm::{DispatchReport, FixedClock, OutboxDispatcher};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

async fn request_tuesday(conn: &sea_orm::DatabaseConnection) -> String {
    service(conn)
        .create_reschedule_request(request_for(PRIVATE_COHORT, at(2025, 1, 7, 10, 0)), &caller(USER_A))
        .await
        .expect("request accepted")
        .id
}

#[tokio::test]
async fn delivers_the_teacher_notification() {
    let conn = seeded_db().await;
    let request_id = request_tuesday(&conn).await;

    let notifier = Arc::new(RecordingNotifier::default());
    let dispatcher = OutboxDispatcher::new(conn.clone(), notifier.clone())
        .with_clock(FixedClock::at(now()));
    let report = dispatcher.dispatch_pending().await.unwrap();
    assert_eq!(report, DispatchReport { delivered: 1, failed: 0 });

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    let message = &sent[0];
    assert_eq!(message.request_id, request_id);
    assert_eq!(message.teacher_email, "ana@school.test");
    assert_eq!(message.teacher_name, "Ana");
    assert_eq!(message.student_name, "Lena Schmidt");
    assert_eq!(message.cohort_name, "A1 Private - Lena");
    assert_eq!(message.original_class_date, "Tuesday, January 7, 2025");
    assert_eq!(message.original_class_time, "10:00");
    assert_eq!(message.proposed_datetime, "Any evening later that week");
    assert_eq!(message.reason.as_deref(), Some("Work trip"));

    let rows = notification_outbox::Entity::find().all(&conn).await.unwrap();
    assert_eq!(rows[0].delivered_at, Some(now().fixed_offset()));
    assert_eq!(rows[0].attempts, 1);

    // Delivered messages are not sent again.
    let report = dispatcher.dispatch_pending().await.unwrap();
    assert_eq!(report, DispatchReport::default());
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn failed_deliveries_are_retried_up_to_the_limit() {
    let conn = seeded_db().await;
    request_tuesday(&conn).await;

    let notifier = RecordingNotifier::failing();
    let dispatcher = OutboxDispatcher::new(conn.clone(), notifier.clone()).with_max_attempts(2);

    for _ in 0..2 {
        let report = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(report, DispatchReport { delivered: 0, failed: 1 });
    }
    assert_eq!(dispatcher.dispatch_pending().await.unwrap(), DispatchReport::default());

    let row = notification_outbox::Entity::find().one(&conn).await.unwrap().unwrap();
    assert_eq!(row.attempts, 2);
    assert!(row.delivered_at.is_none());
    assert_eq!(
        row.last_error.as_deref(),
        Some("notification delivery failed: smtp unavailable")
    );
}

#[tokio::test]
async fn a_delivery_failure_does_not_touch_the_request() {
    let conn = seeded_db().await;
    let request_id = request_tuesday(&conn).await;
    OutboxDispatcher::new(conn.clone(), RecordingNotifier::failing())
        .dispatch_pending()
        .await
        .unwrap();

    let request = service(&conn)
        .ledger()
        .find_by_id(&request_id)
        .await
        .unwrap()
        .expect("request survives");
    assert_eq!(
        request.status,
        reschedule_seaorm::entity::reschedule_request::RequestStatus::Pending
    );
}

#[tokio::test]
async fn undecodable_messages_are_parked() {
    let conn = seeded_db().await;
    notification_outbox::ActiveModel {
        id: Set("garbage".into()),
        kind: Set("reschedule_request_created".into()),
        payload: Set(vec![0xc1, 0x00, 0xff]),
        attempts: Set(0),
        last_error: Set(None),
        created_at: Set(now().fixed_offset()),
        delivered_at: Set(None),
    }
    .insert(&conn)
    .await
    .unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let dispatcher = OutboxDispatcher::new(conn.clone(), notifier.clone()).with_max_attempts(5);
    assert_eq!(
        dispatcher.dispatch_pending().await.unwrap(),
        DispatchReport { delivered: 0, failed: 1 }
    );
    assert_eq!(dispatcher.dispatch_pending().await.unwrap(), DispatchReport::default());

    let row = notification_outbox::Entity::find_by_id("garbage".to_string())
        .one(&conn)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.attempts, 5);
    assert!(row.last_error.unwrap().starts_with("failed to decode outbox payload"));
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn spawned_dispatcher_drains_the_outbox() {
    let conn = seeded_db().await;
    request_tuesday(&conn).await;

    let notifier = Arc::new(RecordingNotifier::default());
    let handle = OutboxDispatcher::new(conn.clone(), notifier.clone())
        .spawn(std::time::Duration::from_millis(10));

    for _ in 0..100 {
        if !notifier.sent().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    handle.abort();
    assert_eq!(notifier.sent().len(), 1);
}
