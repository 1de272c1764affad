use std::sync::Arc;
use crate::config::Config;
use crate::domain::ports::{AvailabilityRepository, BookingStore, SessionTypeRepository};
use crate::domain::services::availability::AvailabilityService;
use crate::domain::services::initiation::InitiationService;
use crate::domain::services::reconciliation::ReconciliationEngine;

/// Shared application state. Everything behind `Arc<dyn Trait>` so tests can
/// swap implementations; the engine and services receive their dependencies
/// at construction, never from module-level singletons.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub booking_store: Arc<dyn BookingStore>,
    pub availability_repo: Arc<dyn AvailabilityRepository>,
    pub session_type_repo: Arc<dyn SessionTypeRepository>,
    pub availability: Arc<AvailabilityService>,
    pub initiation: Arc<InitiationService>,
    pub engine: Arc<ReconciliationEngine>,
}
