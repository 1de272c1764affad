use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::domain::services::availability::AvailabilityService;
use crate::domain::services::initiation::InitiationService;
use crate::domain::services::reconciliation::ReconciliationEngine;
use crate::infra::notify::HttpNotificationDispatcher;
use crate::infra::payments::HttpPaymentGateway;
use crate::infra::repositories::{
    sqlite_availability_repo::SqliteAvailabilityRepo,
    sqlite_booking_repo::SqliteBookingStore,
    sqlite_session_type_repo::SqliteSessionTypeRepo,
};
use crate::infra::scheduling::HttpSchedulingGateway;
use crate::state::AppState;

pub async fn bootstrap_state(config: &Config) -> AppState {
    info!("Initializing SQLite connection with WAL mode...");

    let opts = SqliteConnectOptions::from_str(&config.database_url)
        .expect("Invalid SQLite connection string")
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await
        .expect("Failed to connect to SQLite");

    run_migrations(&pool).await;

    let booking_store = Arc::new(SqliteBookingStore::new(pool.clone()));
    let availability_repo = Arc::new(SqliteAvailabilityRepo::new(pool.clone()));
    let session_type_repo = Arc::new(SqliteSessionTypeRepo::new(pool.clone()));

    let scheduling_gateway = Arc::new(HttpSchedulingGateway::new(
        config.scheduling_link_base.clone(),
        config.scheduling_api_url.clone(),
        config.scheduling_api_key.clone(),
        config.gateway_retry_attempts,
        config.gateway_retry_base_ms,
    ));
    let payment_gateway = Arc::new(HttpPaymentGateway::new(
        config.payment_api_url.clone(),
        config.payment_api_key.clone(),
        config.gateway_retry_attempts,
        config.gateway_retry_base_ms,
    ));
    let notifier = Arc::new(HttpNotificationDispatcher::new(
        config.notification_url.clone(),
        config.notification_token.clone(),
    ));

    let availability = Arc::new(AvailabilityService::new(
        booking_store.clone(),
        availability_repo.clone(),
        session_type_repo.clone(),
    ));
    let initiation = Arc::new(InitiationService::new(
        booking_store.clone(),
        availability.clone(),
        scheduling_gateway.clone(),
        config.pending_hold_minutes,
    ));
    let engine = Arc::new(ReconciliationEngine::new(
        booking_store.clone(),
        scheduling_gateway.clone(),
        payment_gateway.clone(),
        notifier.clone(),
    ));

    AppState {
        config: config.clone(),
        booking_store,
        availability_repo,
        session_type_repo,
        availability,
        initiation,
        engine,
    }
}

async fn run_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .expect("Failed to run migrations");
}
