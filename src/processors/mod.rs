pub mod data_merger;
pub mod gap;
pub mod normalizer;

pub use data_merger::{DataMerger, MergeSummary};
pub use gap::{compute_gap, yesterday, DateWindow, GapDecision};
pub use normalizer::{convert_hour, normalize_table, SchemaNormalizer};
