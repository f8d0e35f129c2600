pub mod health;
pub mod job_kind;
pub mod runner;

pub use job_kind::JobKind;
pub use runner::JobRunner;
