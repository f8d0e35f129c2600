pub mod decision_monitor;

pub use decision_monitor::{CycleOutcome, CycleReport, DecisionMonitor};
