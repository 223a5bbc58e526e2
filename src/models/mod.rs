pub mod archive;
pub mod columns;
pub mod record;
pub mod series;
pub mod sync_state;
pub mod table;

pub use archive::{newest_marker, ArchiveEntry, ArchiveMarker, ArchivePeriod};
pub use columns::{ColumnDictionary, MatchMode};
pub use record::{CanonicalField, CanonicalRecord};
pub use series::StationSeries;
pub use sync_state::{StateStore, StationMeta, SyncState};
pub use table::RawTable;
