use crate::ui::{is_quiet, theme, Icons};
use indicatif::{HumanDuration, ProgressBar};
use owo_colors::OwoColorize;
use std::time::Duration;

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = if is_quiet() {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        pb.set_message(message.to_string());
        if console::Term::stdout().is_term() {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        Self { pb }
    }

    /// Remove the spinner line so a regular line can be printed in its place
    pub fn clear(&self) {
        self.pb.finish_and_clear();
    }

    pub fn finish_with_message(&self, msg: &str) {
        self.pb.finish_with_message(msg.to_string());
    }
}

pub fn finish_with_summary(duration: Duration, steps: usize, warnings: usize) {
    println!();
    println!(
        "{} {}",
        Icons::CHECK.style(theme().success.clone()),
        format!("Complete in {}", HumanDuration(duration)).style(theme().success.clone())
    );
    println!(
        "  {} {}  {} {}",
        Icons::PACKAGE.style(theme().info.clone()),
        steps,
        Icons::CYCLE.style(theme().info.clone()),
        warnings
    );
}
