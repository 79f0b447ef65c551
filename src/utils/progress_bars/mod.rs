pub mod logging;
pub mod progress_callback;
pub mod progress_config;

use indicatif::{ProgressBar, ProgressStyle};

use progress_config::ProgressConfig;

/// Creates a styled per-stage bar, or a hidden one unless detailed progress
/// output is on.
pub fn stage_bar(config: &ProgressConfig, len: u64, emoji: &str, label: &str) -> ProgressBar {
    if !config.should_show_detailed() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    let template = format!(
        "  {} [{{elapsed_precise}}] {{bar:30.cyan/blue}} {{pos}}/{{len}} {} {{msg}}",
        emoji, label
    );
    match ProgressStyle::default_bar().template(&template) {
        Ok(style) => pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  ")),
        Err(e) => log::debug!("Invalid progress template, using default style: {}", e),
    }
    pb
}
