use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub scheduling_webhook_secret: String,
    pub payment_webhook_secret: String,
    pub scheduling_link_base: String,
    pub scheduling_api_url: String,
    pub scheduling_api_key: String,
    pub payment_api_url: String,
    pub payment_api_key: String,
    pub notification_url: String,
    pub notification_token: String,
    /// How long a Pending booking reserves its slot before the sweep fails it.
    pub pending_hold_minutes: i64,
    /// How long a Scheduled booking may wait for its payment before the sweep
    /// fails it and releases the slot.
    pub scheduled_payment_deadline_minutes: i64,
    pub gateway_retry_attempts: u32,
    pub gateway_retry_base_ms: u64,
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().expect("PORT must be a number"),
            scheduling_webhook_secret: env::var("SCHEDULING_WEBHOOK_SECRET").expect("SCHEDULING_WEBHOOK_SECRET must be set"),
            payment_webhook_secret: env::var("PAYMENT_WEBHOOK_SECRET").expect("PAYMENT_WEBHOOK_SECRET must be set"),
            scheduling_link_base: env::var("SCHEDULING_LINK_BASE").unwrap_or_else(|_| "https://schedule.example.com".to_string()),
            scheduling_api_url: env::var("SCHEDULING_API_URL").unwrap_or_else(|_| "https://api.schedule.example.com/v1".to_string()),
            scheduling_api_key: env::var("SCHEDULING_API_KEY").unwrap_or_else(|_| "test-key".to_string()),
            payment_api_url: env::var("PAYMENT_API_URL").unwrap_or_else(|_| "https://api.pay.example.com/v1".to_string()),
            payment_api_key: env::var("PAYMENT_API_KEY").unwrap_or_else(|_| "test-key".to_string()),
            notification_url: env::var("NOTIFICATION_URL").unwrap_or_else(|_| "http://localhost:8000/api/v1/notify".to_string()),
            notification_token: env::var("NOTIFICATION_TOKEN").unwrap_or_else(|_| "test-token-1".to_string()),
            pending_hold_minutes: env::var("PENDING_HOLD_MINUTES").ok().and_then(|v| v.parse().ok()).unwrap_or(15),
            scheduled_payment_deadline_minutes: env::var("SCHEDULED_PAYMENT_DEADLINE_MINUTES").ok().and_then(|v| v.parse().ok()).unwrap_or(60),
            gateway_retry_attempts: env::var("GATEWAY_RETRY_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(3),
            gateway_retry_base_ms: env::var("GATEWAY_RETRY_BASE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(1000),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30),
        }
    }
}
