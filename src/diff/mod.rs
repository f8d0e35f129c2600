pub mod capture;
pub mod duplicate_policy;
pub mod snapshot_diff;

pub use duplicate_policy::DuplicateKeyPolicy;
pub use snapshot_diff::{diff_snapshots, find_duplicate_keys};
