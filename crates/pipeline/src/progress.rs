//! Job progress reporting.
//!
//! Sinks are advisory and must never block stage execution; implementations
//! that talk to the outside world fire-and-forget.

/// Receives coarse progress updates for a running job.
pub trait ProgressSink: Send + Sync {
    /// `percent` is job-wide, 0 to 100.
    fn on_progress(&self, job_id: &str, percent: u8, label: &str);
}

/// Discards all updates.
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _job_id: &str, _percent: u8, _label: &str) {}
}

/// Logs updates through tracing, for CLI runs.
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn on_progress(&self, job_id: &str, percent: u8, label: &str) {
        tracing::info!(job_id, percent, label, "Progress");
    }
}

/// Maps a stage-local 0..=100 onto the stage's slice of the job-wide range.
#[derive(Debug, Clone, Copy)]
pub struct StageWindow {
    pub start: u8,
    pub end: u8,
}

impl StageWindow {
    pub fn new(start: u8, end: u8) -> Self {
        debug_assert!(start <= end && end <= 100);
        Self { start, end }
    }

    pub fn at(&self, local_percent: u8) -> u8 {
        let local = local_percent.min(100) as u32;
        let span = (self.end - self.start) as u32;
        self.start + (local * span / 100) as u8
    }

    pub fn report(&self, sink: &dyn ProgressSink, job_id: &str, local_percent: u8, label: &str) {
        sink.on_progress(job_id, self.at(local_percent), label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CapturingSink {
        updates: Mutex<Vec<(u8, String)>>,
    }

    impl ProgressSink for CapturingSink {
        fn on_progress(&self, _job_id: &str, percent: u8, label: &str) {
            self.updates.lock().unwrap().push((percent, label.to_string()));
        }
    }

    #[test]
    fn test_window_maps_local_to_global() {
        let window = StageWindow::new(30, 60);
        assert_eq!(window.at(0), 30);
        assert_eq!(window.at(50), 45);
        assert_eq!(window.at(100), 60);
        assert_eq!(window.at(200), 60);
    }

    #[test]
    fn test_report_forwards_mapped_percent() {
        let sink = CapturingSink {
            updates: Mutex::new(vec![]),
        };
        let window = StageWindow::new(10, 20);
        window.report(&sink, "job-1", 100, "clips");

        let updates = sink.updates.lock().unwrap();
        assert_eq!(updates.as_slice(), &[(20, "clips".to_string())]);
    }
}
