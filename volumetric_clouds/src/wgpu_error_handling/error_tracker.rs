use std::collections::HashMap;

use parking_lot::Mutex;

struct ErrorEntry {
    /// Frame index for frame on which this error was last logged.
    last_occurred_frame_index: u64,
}

/// Keeps track of errors and de-duplicates messages across frames.
///
/// Errors are considered duplicates if their descriptions match.
/// An error that keeps occurring every frame is logged once, and logged again only after it
/// stopped occurring for at least one frame.
///
/// Used to avoid spamming the user with repeating errors, both from the cloud pass and from
/// wgpu's uncaptured error handler.
#[derive(Default)]
pub struct ErrorTracker {
    errors: Mutex<HashMap<String, ErrorEntry>>,
}

impl ErrorTracker {
    /// Forgets all errors that didn't occur on the just finished frame.
    pub fn on_frame_finished(&self, frame_index: u64) {
        let mut errors = self.errors.lock();
        errors.retain(|_description, entry| frame_index == entry.last_occurred_frame_index);
    }

    /// Logs an error unless it is already known.
    ///
    /// Returns true if the error was logged.
    pub fn handle_error(&self, error: impl std::fmt::Display, frame_index: u64) -> bool {
        let description = error.to_string();
        let is_new = self
            .errors
            .lock()
            .insert(
                description.clone(),
                ErrorEntry {
                    last_occurred_frame_index: frame_index,
                },
            )
            .is_none();

        if is_new {
            log::error!("Frame {frame_index}: {description}");
        }
        is_new
    }

    /// Logs a wgpu error, to be called from the device's uncaptured error handler.
    pub fn handle_wgpu_error(&self, error: wgpu::Error, frame_index: u64) {
        match error {
            wgpu::Error::OutOfMemory { source: _ } => {
                log::error!("A wgpu operation caused out-of-memory: {error}");
            }
            wgpu::Error::Internal {
                source: _,
                description,
            } => {
                self.handle_error(format!("Internal wgpu error: {description}"), frame_index);
            }
            wgpu::Error::Validation {
                source: _,
                description,
            } => {
                self.handle_error(format!("Wgpu validation error: {description}"), frame_index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorTracker;
    use crate::cloud_pass::CloudPassError;

    #[test]
    fn repeating_error_is_logged_once() {
        let tracker = ErrorTracker::default();

        assert!(tracker.handle_error(CloudPassError::MissingNoiseProvider, 0));
        tracker.on_frame_finished(0);
        assert!(!tracker.handle_error(CloudPassError::MissingNoiseProvider, 1));
        tracker.on_frame_finished(1);
        assert!(!tracker.handle_error(CloudPassError::MissingNoiseProvider, 2));
        tracker.on_frame_finished(2);
    }

    #[test]
    fn error_is_logged_again_after_a_clean_frame() {
        let tracker = ErrorTracker::default();

        assert!(tracker.handle_error("boom", 0));
        tracker.on_frame_finished(0);
        tracker.on_frame_finished(1);
        assert!(tracker.handle_error("boom", 2));
    }

    #[test]
    fn distinct_errors_are_tracked_separately() {
        let tracker = ErrorTracker::default();

        assert!(tracker.handle_error("first", 0));
        assert!(tracker.handle_error("second", 0));
        assert!(!tracker.handle_error("first", 0));
    }
}
