pub mod event;
pub mod recorder;

pub use event::{SegmentEvent, SkipReason};
pub use recorder::{TelemetryRecorder, TelemetrySnapshot};
