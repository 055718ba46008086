mod login_prompt;
mod output;

use indicatif::{ProgressBar, ProgressStyle};

pub use login_prompt::TerminalPrompt;
pub use output::{Cell, Table, error_message, field, format_size, hint, render_error, success, time_ago};

/// Cyan spinner with `message`; the caller drives ticking.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}
