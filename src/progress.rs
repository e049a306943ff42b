//! Progress display for reconciliation runs
//!
//! Implements the core engine's progress seam with an indicatif spinner so
//! long-running appliers (brew installs, daemon bootstrap) stay visible.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{OutcomeStatus, ProgressCallback, ReconcileOutcome};
use std::time::Duration;

pub struct SpinnerProgress {
    bar: Option<ProgressBar>,
    done: usize,
    total: usize,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        Self {
            bar: None,
            done: 0,
            total: 0,
        }
    }

    fn glyph(status: &OutcomeStatus) -> String {
        match status {
            OutcomeStatus::Unchanged => "○".dimmed().to_string(),
            OutcomeStatus::Converged => "✓".green().to_string(),
            OutcomeStatus::Failed(_) => "✗".red().to_string(),
            OutcomeStatus::Skipped(_) => "⊘".yellow().to_string(),
        }
    }
}

impl Default for SpinnerProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for SpinnerProgress {
    fn on_run_start(&mut self, total: usize) {
        self.total = total;
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        self.bar = Some(bar);
    }

    fn on_resource_start(&mut self, id: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("[{}/{}] {}", self.done + 1, self.total, id));
        }
    }

    fn on_resource_complete(&mut self, outcome: &ReconcileOutcome) {
        self.done += 1;
        if let Some(bar) = &self.bar {
            bar.println(format!("  {} {}", Self::glyph(&outcome.status), outcome.id));
        }
    }

    fn on_run_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
