pub mod constants;
pub mod logging;
pub mod progress;

pub use constants::*;
pub use logging::init_logging;
pub use progress::{ChannelSink, NullSink, ProgressEvent, ProgressReporter, ProgressSink, RecordingSink};
