mod error_tracker;

pub use error_tracker::ErrorTracker;
