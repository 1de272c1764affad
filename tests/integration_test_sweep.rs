mod common;

use booking_orchestrator::background::run_sweep_once;
use booking_orchestrator::domain::models::booking::{
    Booking, BookingState, FailureReason, NewBookingParams,
};
use chrono::{Duration, Utc};
use common::{body_json, TestApp};
use serde_json::json;
use std::sync::atomic::Ordering;

fn slot_start() -> chrono::DateTime<Utc> {
    (Utc::now() + Duration::days(1))
        .date_naive()
        .and_hms_opt(10, 0, 0)
        .unwrap()
        .and_utc()
}

#[tokio::test]
async fn test_expired_pending_booking_is_failed_by_sweep() {
    let app = TestApp::with_hold_minutes(0).await;
    app.seed_always_open_provider("p1").await;
    let st = app.seed_session_type("p1", 30, None).await;

    let body = body_json(
        app.post_json(
            "/api/v1/bookings",
            json!({
                "provider_id": "p1",
                "session_type_id": st.id,
                "start": slot_start().to_rfc3339(),
            }),
        )
        .await,
    )
    .await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    run_sweep_once(&app.state).await.unwrap();

    let booking = app.booking_by_id(&booking_id).await;
    assert_eq!(booking.state, BookingState::Failed);
    assert_eq!(booking.failure_reason, Some(FailureReason::SchedulingTimeout));
}

#[tokio::test]
async fn test_sweep_leaves_live_holds_alone() {
    let app = TestApp::new().await;
    app.seed_always_open_provider("p1").await;
    let st = app.seed_session_type("p1", 30, None).await;

    let body = body_json(
        app.post_json(
            "/api/v1/bookings",
            json!({
                "provider_id": "p1",
                "session_type_id": st.id,
                "start": slot_start().to_rfc3339(),
            }),
        )
        .await,
    )
    .await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    run_sweep_once(&app.state).await.unwrap();

    let booking = app.booking_by_id(&booking_id).await;
    assert_eq!(booking.state, BookingState::Pending);
    assert_eq!(booking.version, 1);
}

#[tokio::test]
async fn test_elapsed_confirmed_booking_is_completed_by_sweep() {
    let app = TestApp::new().await;

    // Confirmed booking whose session ended an hour ago, put in place
    // directly through the store.
    let pending = Booking::new(NewBookingParams {
        provider_id: "p1".to_string(),
        client_id: None,
        session_type_id: "st1".to_string(),
        is_free_session: true,
        start: Utc::now() + Duration::days(1),
        duration_min: 30,
        hold_minutes: 15,
    });
    let created = app.state.booking_store.create(&pending).await.unwrap();

    let mut confirmed = created.clone();
    confirmed.state = BookingState::Confirmed;
    confirmed.scheduled_start = Some(Utc::now() - Duration::minutes(90));
    confirmed.scheduled_end = Some(Utc::now() - Duration::minutes(60));
    confirmed.external_event_ref = Some("cal_evt_1".to_string());
    app.state
        .booking_store
        .compare_and_swap(created.version, &confirmed)
        .await
        .unwrap();

    run_sweep_once(&app.state).await.unwrap();

    let booking = app.booking_by_id(&created.id).await;
    assert_eq!(booking.state, BookingState::Completed);
}

#[tokio::test]
async fn test_scheduled_booking_past_payment_deadline_is_failed_by_sweep() {
    let app = TestApp::with_timeouts(15, 0).await;
    app.seed_always_open_provider("p1").await;
    let st = app.seed_session_type("p1", 30, Some(5000)).await;

    let body = body_json(
        app.post_json(
            "/api/v1/bookings",
            json!({
                "provider_id": "p1",
                "session_type_id": st.id,
                "start": slot_start().to_rfc3339(),
                "client_id": "client-1",
            }),
        )
        .await,
    )
    .await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    // Payment provider is down when the calendar confirmation lands, so the
    // booking parks in Scheduled with no checkout session.
    app.payments.fail_next.store(true, Ordering::SeqCst);
    let response = app
        .post_webhook(
            "/api/v1/webhooks/scheduling",
            common::SCHEDULING_SECRET,
            json!({
                "event": "invitee.created",
                "payload": {
                    "event_ref": "cal_evt_stalled",
                    "start_time": slot_start().to_rfc3339(),
                    "end_time": (slot_start() + Duration::minutes(30)).to_rfc3339(),
                    "tracking": { "booking_id": booking_id }
                }
            }),
        )
        .await;
    assert_eq!(response.status(), axum::http::StatusCode::BAD_GATEWAY);
    assert_eq!(app.booking_by_id(&booking_id).await.state, BookingState::Scheduled);

    run_sweep_once(&app.state).await.unwrap();

    let booking = app.booking_by_id(&booking_id).await;
    assert_eq!(booking.state, BookingState::Failed);
    assert_eq!(booking.failure_reason, Some(FailureReason::PaymentTimeout));
    assert!(app
        .scheduling
        .cancelled_events
        .lock()
        .unwrap()
        .contains(&"cal_evt_stalled".to_string()));
    assert!(app
        .notifier
        .sent_kinds()
        .contains(&"notify_payment_failure".to_string()));
}

#[tokio::test]
async fn test_sweep_leaves_scheduled_booking_within_payment_deadline() {
    let app = TestApp::new().await;
    app.seed_always_open_provider("p1").await;
    let st = app.seed_session_type("p1", 30, Some(5000)).await;

    let body = body_json(
        app.post_json(
            "/api/v1/bookings",
            json!({
                "provider_id": "p1",
                "session_type_id": st.id,
                "start": slot_start().to_rfc3339(),
                "client_id": "client-1",
            }),
        )
        .await,
    )
    .await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    let response = app
        .post_webhook(
            "/api/v1/webhooks/scheduling",
            common::SCHEDULING_SECRET,
            json!({
                "event": "invitee.created",
                "payload": {
                    "event_ref": "cal_evt_fresh",
                    "start_time": slot_start().to_rfc3339(),
                    "end_time": (slot_start() + Duration::minutes(30)).to_rfc3339(),
                    "tracking": { "booking_id": booking_id }
                }
            }),
        )
        .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    run_sweep_once(&app.state).await.unwrap();

    let booking = app.booking_by_id(&booking_id).await;
    assert_eq!(booking.state, BookingState::Scheduled);
}

#[tokio::test]
async fn test_late_event_after_sweep_failure_alerts_operator() {
    let app = TestApp::with_hold_minutes(0).await;
    app.seed_always_open_provider("p1").await;
    let st = app.seed_session_type("p1", 30, None).await;

    let body = body_json(
        app.post_json(
            "/api/v1/bookings",
            json!({
                "provider_id": "p1",
                "session_type_id": st.id,
                "start": slot_start().to_rfc3339(),
            }),
        )
        .await,
    )
    .await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    run_sweep_once(&app.state).await.unwrap();
    assert_eq!(app.booking_by_id(&booking_id).await.state, BookingState::Failed);

    // The scheduling provider delivers the confirmation anyway.
    let response = app
        .post_webhook(
            "/api/v1/webhooks/scheduling",
            common::SCHEDULING_SECRET,
            json!({
                "event": "invitee.created",
                "payload": {
                    "event_ref": "cal_evt_late",
                    "start_time": slot_start().to_rfc3339(),
                    "end_time": (slot_start() + Duration::minutes(30)).to_rfc3339(),
                    "tracking": { "booking_id": booking_id }
                }
            }),
        )
        .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let booking = app.booking_by_id(&booking_id).await;
    assert_eq!(booking.state, BookingState::Failed, "booking is not resurrected");
    assert_eq!(app.notifier.sent_kinds(), vec!["notify_operator_orphaned_event"]);
}

#[tokio::test]
async fn test_sweep_frees_the_slot_for_rebooking() {
    let app = TestApp::with_hold_minutes(0).await;
    app.seed_always_open_provider("p1").await;
    let st = app.seed_session_type("p1", 30, None).await;
    let start = slot_start().to_rfc3339();

    let first = app
        .post_json(
            "/api/v1/bookings",
            json!({ "provider_id": "p1", "session_type_id": st.id, "start": start }),
        )
        .await;
    assert_eq!(first.status(), axum::http::StatusCode::OK);

    run_sweep_once(&app.state).await.unwrap();

    // Failed bookings do not occupy the interval, so the slot is open again.
    let second = app
        .post_json(
            "/api/v1/bookings",
            json!({ "provider_id": "p1", "session_type_id": st.id, "start": start }),
        )
        .await;
    assert_eq!(second.status(), axum::http::StatusCode::OK);
}
