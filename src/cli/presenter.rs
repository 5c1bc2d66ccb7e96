//! CLI presenter for output formatting

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::audio::Recording;

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Format recording progress bar
    pub fn format_progress(&self, elapsed_ms: u64, total_ms: u64) -> String {
        let elapsed_secs = elapsed_ms / 1000;
        let total_secs = total_ms / 1000;
        let percent = if total_ms > 0 {
            (elapsed_ms as f64 / total_ms as f64 * 100.0).min(100.0)
        } else {
            0.0
        };

        let bar_width = 20;
        let filled = ((percent / 100.0) * bar_width as f64) as usize;
        let empty = bar_width - filled;

        format!(
            "[{}{}] {:>3}s / {}s",
            "█".repeat(filled).cyan(),
            "░".repeat(empty),
            elapsed_secs,
            total_secs
        )
    }

    /// Update recording progress
    pub fn update_recording_progress(&self, elapsed_ms: u64, total_ms: u64) {
        let progress = self.format_progress(elapsed_ms, total_ms);
        self.update_spinner(&format!("Recording... {}", progress));
    }

    /// One-line description of a recording: size and header format
    pub fn describe_recording(&self, recording: &Recording) -> String {
        match recording.wav_spec() {
            Some(spec) => format!(
                "{} ({} Hz, {}-bit, {} channel{})",
                recording.human_readable_size(),
                spec.sample_rate,
                spec.bits_per_sample,
                spec.channels,
                if spec.channels == 1 { "" } else { "s" }
            ),
            None if recording.is_empty() => "empty".to_string(),
            None => format!("{} (unreadable header)", recording.human_readable_size()),
        }
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
