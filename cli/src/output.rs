//! Result formatting

use colored::Colorize;
use serde_json::json;
use wallbounce_application::{AnalysisResponse, EngineSnapshot};
use wallbounce_domain::ApprovalStatus;

pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Answer first, then one line of approval details per fact.
    pub fn format(response: &AnalysisResponse) -> String {
        let mut out = String::new();
        if !response.approved {
            out.push_str(&format!(
                "{}\n\n",
                "NOT APPROVED: treat this answer as a draft.".red().bold()
            ));
        }
        out.push_str(response.content.trim());
        out.push_str("\n\n");

        let status = match response.approval_status {
            ApprovalStatus::Approved => "approved".green(),
            ApprovalStatus::Pending => "pending".yellow(),
            ApprovalStatus::Escalated => "escalated".yellow(),
            ApprovalStatus::Denied => "denied".red(),
        };
        out.push_str(&format!("{} {} ({} risk)\n", "Status:".bold(), status, response.risk_level));
        out.push_str(&format!(
            "{} confidence {:.2}, agreement {:.2}, {} round(s), {}\n",
            "Consensus:".bold(),
            response.confidence,
            response.agreement,
            response.rounds,
            response.strategy.as_str()
        ));
        let providers: Vec<String> = response
            .providers_used
            .iter()
            .map(ToString::to_string)
            .collect();
        out.push_str(&format!("{} {}\n", "Providers:".bold(), providers.join(", ")));
        if !response.tags.is_empty() {
            let tags: Vec<&str> = response.tags.iter().map(|t| t.as_str()).collect();
            out.push_str(&format!("{} {}\n", "Tags:".bold(), tags.join(", ").yellow()));
        }
        if response.from_cache {
            out.push_str(&format!("{} cached result\n", "Source:".bold()));
        }
        out.push_str(&format!(
            "{} {} tokens, cost {:.4}\n",
            "Usage:".bold(),
            response.total_tokens,
            response.total_cost
        ));
        out.push_str(&format!("{} {}", "Audit:".bold(), response.audit_id));
        out
    }

    pub fn format_json(response: &AnalysisResponse, snapshot: &EngineSnapshot) -> String {
        let value = json!({
            "response": response,
            "engine": snapshot,
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}
