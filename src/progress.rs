//! For tracking batch progress

use std::io::{self, Stderr};
use std::time::Duration;

/// A trait that is used to report progress to some consumer.
pub trait ProgressReporter {
    /// Called once, after the input files have been found
    fn begin(&mut self, _total_files: u64) {}

    /// Called after each file has been converted, skipped, or failed.
    fn increase(&mut self);

    /// Called with the summary line when the batch has finished
    fn done(&mut self, _msg: &str) {}
}

/// No-op progress reporter
pub struct NoProgress {}

impl ProgressReporter for NoProgress {
    fn increase(&mut self) {}
}

/// Terminal progress bar on stderr
pub struct ProgressBar {
    label: &'static str,
    bar: Option<pbr::ProgressBar<Stderr>>,
}

impl ProgressBar {
    pub fn new(label: &'static str) -> Self {
        Self { label, bar: None }
    }
}

impl ProgressReporter for ProgressBar {
    fn begin(&mut self, total_files: u64) {
        let mut pb = pbr::ProgressBar::on(io::stderr(), total_files);
        pb.show_speed = false;
        pb.message(self.label);
        pb.set_max_refresh_rate(Some(Duration::from_millis(250)));
        self.bar = Some(pb);
    }

    fn increase(&mut self) {
        if let Some(pb) = &mut self.bar {
            pb.inc();
        }
    }

    fn done(&mut self, msg: &str) {
        if let Some(mut pb) = self.bar.take() {
            pb.finish_print(msg);
        }
    }
}
