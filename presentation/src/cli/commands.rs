//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for coordinated responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Reply with insights, next steps and escalation status
    Text,
    /// The whole response as JSON
    Json,
}

impl From<OutputFormat> for council_domain::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => council_domain::OutputFormat::Text,
            OutputFormat::Json => council_domain::OutputFormat::Json,
        }
    }
}

/// CLI arguments for care-council
#[derive(Parser, Debug)]
#[command(name = "care-council")]
#[command(author, version, about = "Care council - coordinated support from a team of agents")]
#[command(long_about = r#"
Care council sends each message to a team of support agents (intake,
crisis safety, cultural adaptation, progress tracking, coordination),
coordinates their work and prints one response.

Messages that look high-risk are always screened by the crisis safety
agent first and escalated to a human supervisor.

Configuration is loaded from (in priority order):
1. COUNCIL_* environment variables (COUNCIL_COORDINATION__STRATEGY=parallel)
2. --config <path>     Explicit config file
3. ./council.toml      Project-level config
4. ~/.config/care-council/config.toml   Global config

Example:
  care-council "I've been feeling overwhelmed at work"
  care-council --offline --output json "I had a stressful day"
  care-council --user u-42 --cultural-context "first-generation immigrant"
"#)]
pub struct Cli {
    /// The message to coordinate (reads lines from stdin when omitted)
    pub message: Option<String>,

    /// User identifier attached to every message
    #[arg(long, value_name = "ID", default_value = "anonymous")]
    pub user: String,

    /// Session identifier (a new one is generated when omitted)
    #[arg(long, value_name = "ID")]
    pub session: Option<String>,

    /// Force a coordination strategy
    #[arg(long, value_name = "STRATEGY", value_parser = ["sequential", "parallel", "hierarchical", "consensus"])]
    pub strategy: Option<String>,

    /// Cultural background passed to every agent
    #[arg(long, value_name = "TEXT")]
    pub cultural_context: Option<String>,

    /// Use canned fixture replies instead of a model endpoint
    #[arg(long)]
    pub offline: bool,

    /// Output format (overrides [output] format)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print responses
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "care-council",
            "--offline",
            "--strategy",
            "consensus",
            "-o",
            "json",
            "-vv",
            "hello",
        ])
        .unwrap();
        assert_eq!(cli.message.as_deref(), Some("hello"));
        assert!(cli.offline);
        assert_eq!(cli.strategy.as_deref(), Some("consensus"));
        assert_eq!(cli.output, Some(OutputFormat::Json));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.user, "anonymous");
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        assert!(Cli::try_parse_from(["care-council", "--strategy", "random", "hi"]).is_err());
    }
}
