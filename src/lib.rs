pub mod config;
pub mod diff;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod quotes;
pub mod scheduling;
pub mod store;
pub mod types;
