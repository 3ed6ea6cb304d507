pub mod bidirectional;
pub mod progress;
pub mod unidirectional;

pub use bidirectional::BidirectionalEngine;
pub use progress::{CancelToken, ProgressReport, ProgressTracker, SearchEvent};
pub use unidirectional::UnidirectionalEngine;
