pub mod engine;

pub use engine::{RefreshReport, StationOutcome, StationStatus, StatusReport, SyncEngine};
