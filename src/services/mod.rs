//! Services that keep I/O, display and progress concerns out of the session logic

pub mod display;
pub mod io;
pub mod progress;

pub use display::DisplayProjector;
pub use io::ImageIOService;
pub use progress::{
    LoggingProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
