pub mod baseline_repository;
pub mod change_log;
pub mod lease;
pub mod property_store;
pub mod table_store;
