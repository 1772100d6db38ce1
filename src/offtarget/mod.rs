pub mod batch;
pub mod search;

pub use batch::{profile_candidates_observed, profile_candidates_parallel, BatchOutcome};
pub use search::{profile, OffTargetSearcher};
