use booking_orchestrator::{
    api::router::create_router,
    config::Config,
    domain::models::availability::{AvailabilityException, AvailabilityRule},
    domain::models::booking::Booking,
    domain::models::events::Notification,
    domain::models::session_type::SessionType,
    domain::ports::{NotificationDispatcher, PaymentGateway, SchedulingGateway},
    domain::services::availability::AvailabilityService,
    domain::services::initiation::InitiationService,
    domain::services::reconciliation::ReconciliationEngine,
    error::AppError,
    infra::repositories::{
        sqlite_availability_repo::SqliteAvailabilityRepo,
        sqlite_booking_repo::SqliteBookingStore,
        sqlite_session_type_repo::SqliteSessionTypeRepo,
    },
    infra::webhook_signature::sign,
    state::AppState,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const SCHEDULING_SECRET: &str = "test-scheduling-secret";
pub const PAYMENT_SECRET: &str = "test-payment-secret";

/// Records outbound calls instead of talking to a calendar provider.
#[derive(Default)]
pub struct MockSchedulingGateway {
    pub cancelled_events: Mutex<Vec<String>>,
}

#[async_trait]
impl SchedulingGateway for MockSchedulingGateway {
    fn build_scheduling_link(&self, booking: &Booking) -> String {
        format!(
            "https://schedule.test/{}/{}?tracking[booking_id]={}",
            booking.provider_id, booking.session_type_id, booking.id
        )
    }

    async fn cancel_event(&self, external_event_ref: &str) -> Result<(), AppError> {
        self.cancelled_events
            .lock()
            .unwrap()
            .push(external_event_ref.to_string());
        Ok(())
    }
}

/// Hands out sequential checkout refs; flip `fail_next` to simulate an
/// unreachable payment provider.
#[derive(Default)]
pub struct MockPaymentGateway {
    pub fail_next: AtomicBool,
    counter: AtomicU64,
    pub created_for: Mutex<Vec<String>>,
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(&self, booking: &Booking) -> Result<String, AppError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AppError::GatewayUnavailable("payment provider down".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.created_for.lock().unwrap().push(booking.id.clone());
        Ok(format!("cs_test_{}", n))
    }
}

#[derive(Default)]
pub struct MockNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationDispatcher for MockNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

impl MockNotifier {
    pub fn sent_kinds(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|n| match n {
                Notification::SendConfirmation { .. } => "send_confirmation".to_string(),
                Notification::NotifyPaymentFailure { .. } => "notify_payment_failure".to_string(),
                Notification::NotifyOperatorOrphanedEvent { .. } => {
                    "notify_operator_orphaned_event".to_string()
                }
            })
            .collect()
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
    pub scheduling: Arc<MockSchedulingGateway>,
    pub payments: Arc<MockPaymentGateway>,
    pub notifier: Arc<MockNotifier>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        Self::with_hold_minutes(15).await
    }

    pub async fn with_hold_minutes(hold_minutes: i64) -> Self {
        Self::with_timeouts(hold_minutes, 60).await
    }

    pub async fn with_timeouts(hold_minutes: i64, payment_deadline_minutes: i64) -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let connection_options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(connection_options)
            .await
            .expect("Failed to connect to test db");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to migrate test db");

        let config = Config {
            database_url: db_url.clone(),
            port: 0,
            scheduling_webhook_secret: SCHEDULING_SECRET.to_string(),
            payment_webhook_secret: PAYMENT_SECRET.to_string(),
            scheduling_link_base: "https://schedule.test".to_string(),
            scheduling_api_url: "https://api.schedule.test/v1".to_string(),
            scheduling_api_key: "test".to_string(),
            payment_api_url: "https://api.pay.test/v1".to_string(),
            payment_api_key: "test".to_string(),
            notification_url: "http://localhost/notify".to_string(),
            notification_token: "test".to_string(),
            pending_hold_minutes: hold_minutes,
            scheduled_payment_deadline_minutes: payment_deadline_minutes,
            gateway_retry_attempts: 1,
            gateway_retry_base_ms: 1,
            sweep_interval_secs: 3600,
        };

        let booking_store = Arc::new(SqliteBookingStore::new(pool.clone()));
        let availability_repo = Arc::new(SqliteAvailabilityRepo::new(pool.clone()));
        let session_type_repo = Arc::new(SqliteSessionTypeRepo::new(pool.clone()));

        let scheduling = Arc::new(MockSchedulingGateway::default());
        let payments = Arc::new(MockPaymentGateway::default());
        let notifier = Arc::new(MockNotifier::default());

        let availability = Arc::new(AvailabilityService::new(
            booking_store.clone(),
            availability_repo.clone(),
            session_type_repo.clone(),
        ));
        let initiation = Arc::new(InitiationService::new(
            booking_store.clone(),
            availability.clone(),
            scheduling.clone(),
            config.pending_hold_minutes,
        ));
        let engine = Arc::new(ReconciliationEngine::new(
            booking_store.clone(),
            scheduling.clone(),
            payments.clone(),
            notifier.clone(),
        ));

        let state = Arc::new(AppState {
            config: config.clone(),
            booking_store,
            availability_repo,
            session_type_repo,
            availability,
            initiation,
            engine,
        });

        let router = create_router(state.clone());

        Self {
            router,
            pool,
            db_filename,
            state,
            scheduling,
            payments,
            notifier,
        }
    }

    /// Opens every weekday 00:00-24:00 UTC so tests can book arbitrary
    /// future instants without weekday arithmetic.
    pub async fn seed_always_open_provider(&self, provider_id: &str) {
        for weekday in 0..7 {
            self.state
                .availability_repo
                .create_rule(&AvailabilityRule::new(
                    provider_id.to_string(),
                    weekday,
                    "00:00".to_string(),
                    "24:00".to_string(),
                    "UTC".to_string(),
                ))
                .await
                .expect("Failed to seed availability rule");
        }
    }

    pub async fn seed_rule(
        &self,
        provider_id: &str,
        weekday: i64,
        start: &str,
        end: &str,
        timezone: &str,
    ) {
        self.state
            .availability_repo
            .create_rule(&AvailabilityRule::new(
                provider_id.to_string(),
                weekday,
                start.to_string(),
                end.to_string(),
                timezone.to_string(),
            ))
            .await
            .expect("Failed to seed availability rule");
    }

    pub async fn seed_exception(
        &self,
        provider_id: &str,
        date: chrono::NaiveDate,
        start: &str,
        end: &str,
        is_blocked: bool,
    ) {
        self.state
            .availability_repo
            .create_exception(&AvailabilityException::new(
                provider_id.to_string(),
                date,
                start.to_string(),
                end.to_string(),
                is_blocked,
            ))
            .await
            .expect("Failed to seed availability exception");
    }

    pub async fn seed_session_type(
        &self,
        provider_id: &str,
        duration_minutes: i64,
        price_cents: Option<i64>,
    ) -> SessionType {
        self.state
            .session_type_repo
            .create(&SessionType::new(
                provider_id.to_string(),
                duration_minutes,
                price_cents,
            ))
            .await
            .expect("Failed to seed session type")
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    /// Posts a signed webhook the way the provider would.
    pub async fn post_webhook(
        &self,
        uri: &str,
        secret: &str,
        body: serde_json::Value,
    ) -> Response<Body> {
        let bytes = body.to_string().into_bytes();
        let signature = sign(secret, Utc::now().timestamp(), &bytes);

        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("webhook-signature", signature)
                    .body(Body::from(bytes))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn booking_by_id(&self, booking_id: &str) -> Booking {
        self.state
            .booking_store
            .find_by_id(booking_id)
            .await
            .expect("Failed to load booking")
            .expect("Booking not found")
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
    }
}
