//! Interactive approval on the terminal.
//!
//! When a result needs review, the user sees:
//!
//! ```text
//! ═══════════════════════════════════════════════════════════════
//!   Review required (critical risk)
//! ═══════════════════════════════════════════════════════════════
//!
//! Request: 6f1c...
//! Summary:
//!   <consensus summary>
//!
//! Approve? [y/N]
//! ```

use colored::Colorize;
use std::io::{self, BufRead, Write};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;
use wallbounce_infrastructure::ReviewTicket;

/// Answer review tickets from stdin until the channel closes.
pub fn spawn_console_reviewer(mut tickets: mpsc::Receiver<ReviewTicket>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(ticket) = tickets.recv().await {
            display_notice(&ticket);
            let answer = tokio::task::spawn_blocking(read_answer).await;
            let approved = match answer {
                Ok(Ok(approved)) => approved,
                Ok(Err(e)) => {
                    warn!(error = %e, "Could not read review answer; denying");
                    false
                }
                Err(e) => {
                    warn!(error = %e, "Review prompt failed; denying");
                    false
                }
            };

            let reviewer = reviewer_id();
            let delivered = if approved {
                ticket.approve(reviewer)
            } else {
                ticket.deny(reviewer)
            };
            if !delivered {
                eprintln!("{}", "Review arrived too late; the result was escalated.".yellow());
            }
        }
    })
}

fn display_notice(ticket: &ReviewTicket) {
    let rule = "═══════════════════════════════════════════════════════════════";
    let notice = &ticket.notice;
    eprintln!();
    eprintln!("{}", rule.yellow().bold());
    eprintln!(
        "{}",
        format!("  Review required ({} risk)", notice.risk_level)
            .yellow()
            .bold()
    );
    eprintln!("{}", rule.yellow().bold());
    eprintln!();
    eprintln!("{} {}", "Request:".cyan().bold(), notice.request_id);
    eprintln!("{}", "Summary:".cyan().bold());
    for line in notice.consensus_summary.lines() {
        eprintln!("  {}", line);
    }
    eprintln!();
}

fn read_answer() -> io::Result<bool> {
    eprint!("{} ", "Approve? [y/N]".bold());
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(parse_answer(&line))
}

fn parse_answer(line: &str) -> bool {
    matches!(
        line.trim().to_lowercase().as_str(),
        "y" | "yes" | "a" | "approve" | "/approve"
    )
}

fn reviewer_id() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .map(|user| format!("console:{}", user))
        .unwrap_or_else(|_| "console".to_string())
}
