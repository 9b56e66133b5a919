//! Terminal output for runs: tracing bootstrap and the progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use course_mirror_core::RunObserver;

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_show_progress_bar(
    stderr_is_terminal: bool,
    quiet: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

/// Default filter directive when `RUST_LOG` is unset.
pub(crate) fn resolve_default_log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

pub(crate) fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!is_dumb_terminal())
        .with_env_filter(filter)
        .try_init();
}

/// Status lines go to the log; progress drives a 0-100 bar on stderr.
pub(crate) struct ConsoleObserver {
    bar: ProgressBar,
}

impl ConsoleObserver {
    pub(crate) fn new(show_bar: bool) -> Self {
        if !show_bar {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl RunObserver for ConsoleObserver {
    fn status(&self, message: &str) {
        self.bar.suspend(|| info!("{message}"));
    }

    fn progress(&self, percent: u8) {
        self.bar.set_position(u64::from(percent.min(100)));
    }
}
