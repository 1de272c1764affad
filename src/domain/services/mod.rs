pub mod availability;
pub mod initiation;
pub mod reconciliation;
