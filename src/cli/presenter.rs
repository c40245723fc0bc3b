//! CLI presenter for output formatting

use std::io::{self, Write};
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

const LEVEL_BAR_WIDTH: usize = 20;
const PROGRESS_STEPS: u64 = 1000;

/// Presenter for CLI output formatting.
///
/// Holds at most one live status line (spinner or level meter) and one
/// playback progress bar.
pub struct Presenter {
    status: Option<ProgressBar>,
    progress: Option<ProgressBar>,
}

impl Presenter {
    pub fn new() -> Self {
        Self {
            status: None,
            progress: None,
        }
    }

    /// Show a live status line, replacing any previous one
    pub fn start_spinner(&mut self, message: &str) {
        self.stop_spinner();
        let line = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            line.set_style(style.tick_strings(&["◐", "◓", "◑", "◒", "●"]));
        }
        line.set_message(message.to_string());
        line.enable_steady_tick(Duration::from_millis(120));
        self.status = Some(line);
    }

    pub fn update_spinner(&self, message: &str) {
        if let Some(line) = &self.status {
            line.set_message(message.to_string());
        }
    }

    pub fn spinner_success(&mut self, message: &str) {
        self.finish_status(format!("{} {}", "✓".green(), message));
    }

    pub fn spinner_fail(&mut self, message: &str) {
        self.finish_status(format!("{} {}", "✗".red(), message));
    }

    /// Remove the status line without leaving a message
    pub fn stop_spinner(&mut self) {
        if let Some(line) = self.status.take() {
            line.finish_and_clear();
        }
    }

    fn finish_status(&mut self, message: String) {
        match self.status.take() {
            Some(line) => line.finish_with_message(message),
            None => eprintln!("{}", message),
        }
    }

    /// Start a playback progress bar
    pub fn start_progress(&mut self, message: &str) {
        let bar = ProgressBar::new(PROGRESS_STEPS);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{msg} [{bar:30.cyan/blue}] {percent:>3}%")
        {
            bar.set_style(style.progress_chars("█▓░"));
        }
        bar.set_message(message.to_string());
        self.progress = Some(bar);
    }

    /// Set progress as a fraction in `[0, 1]`
    pub fn set_progress(&self, fraction: f32) {
        if let Some(ref bar) = self.progress {
            bar.set_position((fraction.clamp(0.0, 1.0) * PROGRESS_STEPS as f32) as u64);
        }
    }

    pub fn finish_progress(&mut self, message: &str) {
        if let Some(bar) = self.progress.take() {
            bar.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    pub fn abandon_progress(&mut self, message: &str) {
        if let Some(bar) = self.progress.take() {
            bar.abandon_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
        let _ = io::stdout().flush();
    }

    /// Format the input level meter with elapsed time
    pub fn format_level(&self, level: f32, elapsed: Duration, limit: Option<Duration>) -> String {
        let filled = (level.clamp(0.0, 1.0) * LEVEL_BAR_WIDTH as f32).round() as usize;
        let empty = LEVEL_BAR_WIDTH - filled;

        let time = match limit {
            Some(limit) => format!("{} / {}", format_clock(elapsed), format_clock(limit)),
            None => format_clock(elapsed),
        };

        format!(
            "[{}{}] {}",
            "█".repeat(filled).green(),
            "░".repeat(empty),
            time
        )
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
