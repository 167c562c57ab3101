//! Line-oriented chat session

use crate::output::console::ConsoleFormatter;
use council_application::CoordinationEngine;
use council_domain::{AgentMessage, CoordinatedResponse, MessageContext, OutputFormat};
use std::io::{self, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

/// Chat session bound to one user and one council session id
pub struct ChatSession {
    engine: Arc<CoordinationEngine>,
    user_id: String,
    session_id: String,
    context: MessageContext,
    format: OutputFormat,
    quiet: bool,
}

impl ChatSession {
    pub fn new(
        engine: Arc<CoordinationEngine>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            user_id: user_id.into(),
            session_id: session_id.into(),
            context: MessageContext::new(),
            format: OutputFormat::Text,
            quiet: false,
        }
    }

    pub fn with_context(mut self, context: MessageContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Suppress the banner and command help
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Coordinate one message.
    pub async fn respond(&self, text: &str) -> CoordinatedResponse {
        let message = AgentMessage::new(&self.session_id, &self.user_id, text);
        self.engine.coordinate(&message, &self.context).await
    }

    /// Read messages until EOF or `/quit`. Returns how many were coordinated.
    pub async fn run<R, W>(&self, input: R, out: &mut W) -> io::Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        if !self.quiet {
            self.print_welcome(out)?;
        }

        let mut lines = input.lines();
        let mut processed = 0;
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('/') {
                if self.handle_command(line, out)? {
                    break;
                }
                continue;
            }

            let response = self.respond(line).await;
            processed += 1;
            debug!(session = %self.session_id, round = response.round, "Round finished");
            writeln!(out, "{}", ConsoleFormatter::render(&response, self.format))?;
            out.flush()?;
        }
        Ok(processed)
    }

    fn print_welcome<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Care council session {}", self.session_id)?;
        writeln!(
            out,
            "Agents: {}",
            self.engine
                .registry()
                .types()
                .iter()
                .map(|t| t.display_name())
                .collect::<Vec<_>>()
                .join(", ")
        )?;
        writeln!(out, "Type a message, /help for commands, /quit to leave.")?;
        writeln!(out)
    }

    /// Handle slash commands. Returns true if the session should end.
    fn handle_command<W: Write>(&self, cmd: &str, out: &mut W) -> io::Result<bool> {
        match cmd {
            "/quit" | "/exit" | "/q" => return Ok(true),
            "/help" | "/h" | "/?" => {
                writeln!(out, "Commands:")?;
                writeln!(out, "  /help, /h, /?   - Show this help")?;
                writeln!(out, "  /status         - Show agent status")?;
                writeln!(out, "  /plan           - Show this session's plan")?;
                writeln!(out, "  /quit, /exit    - Leave the session")?;
            }
            "/status" => {
                for agent in self.engine.registry().agents() {
                    let metrics = agent.performance_metrics();
                    writeln!(
                        out,
                        "  {:<20} {:<10} breaker={} requests={} success_rate={:.2}",
                        agent.agent_type().display_name(),
                        agent.status().as_str(),
                        agent.circuit_breaker_state().state,
                        metrics.total_requests,
                        metrics.success_rate
                    )?;
                }
            }
            "/plan" => match self.engine.session_plan(&self.session_id) {
                Some(plan) => writeln!(
                    out,
                    "  round {} strategy={} escalations={} last_quality={}",
                    plan.round,
                    plan.strategy(),
                    plan.escalations,
                    plan.last_quality_score
                        .map(|q| format!("{:.2}", q))
                        .unwrap_or_else(|| "-".to_string())
                )?,
                None => writeln!(out, "  no rounds yet")?,
            },
            other => writeln!(out, "Unknown command: {} (try /help)", other)?,
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_application::{
        AgentRegistry, CoordinationConfig, NoObserver, RuntimeConfig,
    };
    use council_domain::CrisisFallbackScorer;
    use council_infrastructure::CannedLlmGateway;

    fn session() -> ChatSession {
        let registry = AgentRegistry::with_all_agents(
            Arc::new(CannedLlmGateway::new()),
            Arc::new(NoObserver),
            RuntimeConfig::default(),
            CrisisFallbackScorer::default(),
        );
        let engine = CoordinationEngine::new(
            registry,
            Arc::new(NoObserver),
            CoordinationConfig::default(),
        );
        ChatSession::new(Arc::new(engine), "u-1", "s-chat").with_quiet(true)
    }

    #[tokio::test]
    async fn test_run_stops_at_quit() {
        colored::control::set_override(false);
        let session = session();
        let mut out = Vec::new();
        let input: &[u8] = b"\nI had a stressful day\n/plan\n/quit\nnever read\n";

        let processed = session.run(input, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(processed, 1);
        assert!(text.contains("strategy="));
        assert!(text.contains("round 1"));
    }

    #[tokio::test]
    async fn test_unknown_command_is_reported() {
        let session = session();
        let mut out = Vec::new();
        let input: &[u8] = b"/bogus\n";

        let processed = session.run(input, &mut out).await.unwrap();
        assert_eq!(processed, 0);
        assert!(String::from_utf8(out).unwrap().contains("Unknown command: /bogus"));
    }

    #[tokio::test]
    async fn test_json_format_writes_parseable_response() {
        let session = session().with_format(OutputFormat::Json);
        let response = session.respond("hello").await;
        assert_eq!(response.session_id, "s-chat");

        let rendered = ConsoleFormatter::render(&response, OutputFormat::Json);
        let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(json["session_id"], "s-chat");
    }
}
