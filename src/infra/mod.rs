pub mod factory;
pub mod notify;
pub mod payments;
pub mod repositories;
pub mod retry;
pub mod scheduling;
pub mod webhook_signature;
