pub mod sqlite_availability_repo;
pub mod sqlite_booking_repo;
pub mod sqlite_session_type_repo;
