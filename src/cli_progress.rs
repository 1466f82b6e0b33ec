/*!
 * Page spinner for interactive runs
 *
 * Shows the page being processed and the running count of accepted rows.
 * Drawn on stderr by indicatif; hidden when output is JSON.
 */

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::{PageProgress, ReportObserver};

/// Spinner that follows the report run page by page
pub struct PageSpinner {
    bar: ProgressBar,
}

impl PageSpinner {
    /// Create a spinner; `visible = false` renders nothing
    pub fn new(visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(style);
        }
        bar.set_message("Requesting first page...");
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }
}

impl ReportObserver for PageSpinner {
    fn page_processed(&self, progress: &PageProgress) {
        self.bar.set_message(page_message(progress));
    }

    fn finished(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for PageSpinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// Spinner text after a page
pub fn page_message(progress: &PageProgress) -> String {
    let mut message = format!(
        "Page {}: {} desktop flows accepted",
        progress.page_number, progress.accepted_total
    );
    if let Some(total) = progress.total_record_count {
        message.push_str(&format!(" ({} in environment)", total));
    }
    message
}
