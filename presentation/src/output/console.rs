//! Console output formatter for coordinated responses

use colored::Colorize;
use council_domain::{CoordinatedResponse, OutputFormat, RiskTier};

/// Formats coordinated responses for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Render in the requested format.
    pub fn render(response: &CoordinatedResponse, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => Self::format(response),
            OutputFormat::Json => Self::format_json(response),
        }
    }

    /// Human-readable reply followed by insights and next steps
    pub fn format(response: &CoordinatedResponse) -> String {
        let mut output = String::new();

        if response.escalation_needed {
            output.push_str(&format!(
                "{} {}\n\n",
                "[ESCALATED]".red().bold(),
                "A member of the care team has been notified.".red()
            ));
        }

        output.push_str(&response.response);
        output.push('\n');

        if let Some(cultural) = &response.cultural_integration {
            output.push_str(&format!("\n{} {}\n", "Cultural note:".cyan().bold(), cultural));
        }

        Self::push_list(&mut output, &"Insights:".cyan().bold().to_string(), &response.insights);
        Self::push_list(
            &mut output,
            &"Next steps:".green().bold().to_string(),
            &response.next_steps,
        );

        output.push_str(&format!("\n{}\n", Self::summary(response).dimmed()));
        output
    }

    /// Format as JSON
    pub fn format_json(response: &CoordinatedResponse) -> String {
        serde_json::to_string_pretty(response).unwrap_or_else(|_| "{}".to_string())
    }

    /// One-line run summary: strategy, agents, quality, risk, timing
    pub fn summary(response: &CoordinatedResponse) -> String {
        let strategy = response
            .strategy
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string());
        let quality = response
            .quality
            .as_ref()
            .map(|q| format!("{:.2}", q.overall))
            .unwrap_or_else(|| "-".to_string());

        let mut line = format!(
            "strategy={} agents={}/{} quality={} risk={} round={} {}ms",
            strategy,
            response.successful_agents(),
            response.agent_results.len(),
            quality,
            Self::risk_label(response.risk_tier),
            response.round,
            response.processing_time_ms
        );
        if let Some(reason) = &response.fallback_reason {
            line.push_str(&format!(" fallback=\"{}\"", reason));
        }
        line
    }

    fn risk_label(tier: RiskTier) -> String {
        match tier {
            RiskTier::High | RiskTier::Crisis => tier.as_str().to_uppercase(),
            _ => tier.as_str().to_string(),
        }
    }

    fn push_list(output: &mut String, heading: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        output.push_str(&format!("\n{}\n", heading));
        for item in items {
            output.push_str(&format!("  * {}\n", item));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_fallback_text_shows_escalation_and_reason() {
        plain();
        let response = CoordinatedResponse::fallback("s-1", RiskTier::Crisis, "no agent answered");
        let text = ConsoleFormatter::format(&response);

        assert!(text.starts_with("[ESCALATED]"));
        assert!(text.contains("988"));
        assert!(text.contains("Next steps:"));
        assert!(text.contains("strategy=none"));
        assert!(text.contains("risk=CRISIS"));
        assert!(text.contains("fallback=\"no agent answered\""));
    }

    #[test]
    fn test_calm_fallback_has_no_banner() {
        plain();
        let response = CoordinatedResponse::fallback("s-1", RiskTier::None, "offline");
        let text = ConsoleFormatter::format(&response);
        assert!(!text.contains("[ESCALATED]"));
        assert!(!text.contains("Insights:"));
    }

    #[test]
    fn test_json_carries_whole_response() {
        let response = CoordinatedResponse::fallback("s-9", RiskTier::Low, "offline");
        let json: serde_json::Value =
            serde_json::from_str(&ConsoleFormatter::render(&response, OutputFormat::Json))
                .unwrap();
        assert_eq!(json["session_id"], "s-9");
        assert_eq!(json["is_fallback"], true);
        assert_eq!(json["risk_tier"], "low");
    }
}
