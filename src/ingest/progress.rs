use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::IngestStats;

/// Spinner with the running counters as its message.
///
/// Anything else written to the terminal while the spinner is drawn has to
/// go through [`Progress::suspend`].
pub struct Progress {
    every: u64,
    bar: ProgressBar,
}

impl Progress {
    pub const DEFAULT_EVERY: u64 = 200;

    /// Update `bar` every `every` lines, `0` is treated as `1`.
    pub fn new(every: u64, bar: ProgressBar) -> Progress {
        Progress {
            every: every.max(1),
            bar,
        }
    }

    /// Drawn on stdout, nothing is drawn if stdout isn't a terminal.
    pub fn stdout(every: u64) -> Progress {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout());
        match ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            Ok(style) => bar.set_style(style),
            Err(err) => log::debug!("invalid spinner template: {:?}", err),
        }
        Self::new(every, bar)
    }

    pub fn hidden() -> Progress {
        Self::new(Self::DEFAULT_EVERY, ProgressBar::hidden())
    }

    /// Called after every line, only redraws every `every` lines.
    pub fn tick(&self, stats: &IngestStats) {
        self.bar.set_position(stats.lines_read);
        if stats.lines_read % self.every == 0 {
            self.bar.set_message(stats.to_string());
        }
    }

    /// Leaves the final counters on screen.
    pub fn finish(&self, stats: &IngestStats) {
        self.bar.set_position(stats.lines_read);
        self.bar.finish_with_message(stats.to_string());
    }

    /// Run `f` with the spinner cleared, for logging in between updates.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }
}
