pub mod reconciler;
pub mod trading_window;
pub mod trigger_registry;
pub mod types;
pub mod zoned_time;
