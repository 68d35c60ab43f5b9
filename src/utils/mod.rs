pub mod background;
pub mod progress;

pub use background::ExtractionJob;
pub use progress::{NoProgress, ProgressEvent, ProgressSink};
