//! Progress reporting on stderr

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Mutex, PoisonError};
use wallbounce_application::{ProgressNotifier, ReviewNotice};
use wallbounce_domain::{ConsensusResult, ProviderId};

/// One progress bar per dispatch round
pub struct ProgressReporter {
    round_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            round_bar: Mutex::new(None),
        }
    }

    fn round_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        let mut bar = self.round_bar.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut bar);
    }
}

impl ProgressNotifier for ProgressReporter {
    fn on_round_start(&self, round: u32, providers: &[ProviderId]) {
        let bar = ProgressBar::new(providers.len() as u64);
        bar.set_style(Self::round_style());
        bar.set_prefix(format!("Round {}", round));
        bar.set_message("asking providers...");
        self.with_bar(|slot| *slot = Some(bar));
    }

    fn on_provider_complete(&self, _round: u32, provider: &ProviderId, success: bool) {
        self.with_bar(|slot| {
            if let Some(bar) = slot.as_ref() {
                let status = if success {
                    format!("{} {}", "v".green(), provider)
                } else {
                    format!("{} {}", "x".red(), provider)
                };
                bar.set_message(status);
                bar.inc(1);
            }
        });
    }

    fn on_round_complete(&self, round: u32, result: Option<&ConsensusResult>) {
        self.with_bar(|slot| {
            if let Some(bar) = slot.take() {
                let message = match result {
                    Some(r) => format!(
                        "confidence {:.2}, agreement {:.2}",
                        r.confidence, r.agreement
                    ),
                    None => "not enough answers".yellow().to_string(),
                };
                bar.finish_with_message(message);
            }
        });
        tracing::debug!(round, "Round finished");
    }

    fn on_review_requested(&self, notice: &ReviewNotice) {
        eprintln!(
            "{} {} risk result is waiting for review",
            "->".yellow(),
            notice.risk_level
        );
    }

    fn on_cache_hit(&self) {
        eprintln!("{} served from cache", "->".green());
    }
}
