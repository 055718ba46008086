use std::sync::Mutex;
use std::time::Duration;

use crossterm::style::Stylize;
use indicatif::ProgressBar;

use crate::api::DeviceAuthSession;
use crate::auth::LoginPrompt;

use super::spinner;

/// Interactive device-login prompt: prints the code, tries the browser,
/// and spins while the server waits for approval.
#[derive(Default)]
pub struct TerminalPrompt {
    spinner: Mutex<Option<ProgressBar>>,
}

impl LoginPrompt for TerminalPrompt {
    fn show_code(&self, session: &DeviceAuthSession) {
        println!();
        println!(
            "  Your one-time code: {}",
            session.user_code.as_str().bold().cyan()
        );
        println!();
        println!("  Approve this device at:");
        println!("  {}", session.verification_url.as_str().underlined());
        println!();
    }

    fn open_browser(&self, url: &str) -> bool {
        match webbrowser::open(url) {
            Ok(()) => {
                println!("{}", "  Opened your browser.".dark_grey());
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "could not open browser");
                println!(
                    "{}",
                    "  Open the link above in a browser to continue.".dark_grey()
                );
                false
            }
        }
    }

    fn waiting(&self) {
        let pb = spinner("Waiting for approval...");
        pb.enable_steady_tick(Duration::from_millis(100));
        let mut slot = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(pb) {
            previous.finish_and_clear();
        }
    }

    fn done(&self) {
        let mut slot = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pb) = slot.take() {
            pb.finish_and_clear();
        }
    }
}
