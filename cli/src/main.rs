//! CLI entrypoint for care-council
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use council_application::{
    AgentRegistry, BusObserver, CollaborationWorkflow, CompositeObserver, CoordinationEngine,
    CoordinationObserver, CouncilConfig, EventBus, LlmGateway,
};
use council_domain::{CrisisFallbackScorer, MessageContext, OutputFormat};
use council_infrastructure::{
    CannedLlmGateway, ConfigLoader, FileConfig, FileLoggingConfig, InProcessEventBus,
    JsonlEventLogger, OpenAiGateway,
};
use council_presentation::{ChatSession, Cli, ConsoleFormatter};
use serde_json::Value;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Everything `main` has to stop on the way out.
struct Council {
    registry: AgentRegistry,
    engine: Arc<CoordinationEngine>,
    cancel: CancellationToken,
    monitors: Vec<tokio::task::JoinHandle<()>>,
    _escalations: council_application::Subscription,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources();
        return Ok(());
    }

    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };

    let _log_guard = init_logging(cli.verbose, cli.quiet, &file_config.logging);

    let issues = file_config.validate();
    for issue in &issues {
        eprintln!("{}", issue);
    }
    if issues.iter().any(|i| i.is_error()) {
        bail!("Invalid configuration ({} issue(s))", issues.len());
    }

    let mut config = file_config.to_council_config();
    if let Some(strategy) = &cli.strategy {
        config.coordination = config.coordination.with_strategy_override(strategy.clone());
    }

    info!("Starting care council");
    let council = build_council(&cli, &file_config, &config)?;

    let session_id = cli
        .session
        .clone()
        .unwrap_or_else(|| format!("session-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S")));
    let mut context = MessageContext::new();
    if let Some(cultural) = &cli.cultural_context {
        context = context.with_cultural_context(cultural.clone());
    }
    let format: OutputFormat = file_config.output.resolve_format(cli.output.map(Into::into));
    if !file_config.output.use_color(format) {
        colored::control::set_override(false);
    }

    let chat = ChatSession::new(Arc::clone(&council.engine), &cli.user, &session_id)
        .with_context(context)
        .with_format(format)
        .with_quiet(cli.quiet);

    let result = match &cli.message {
        Some(message) => {
            let response = chat.respond(message).await;
            println!("{}", ConsoleFormatter::render(&response, format));
            Ok(())
        }
        None => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            tokio::select! {
                processed = chat.run(stdin, &mut stdout) => processed
                    .map(|n| info!(session = %session_id, messages = n, "Session ended"))
                    .context("Chat session failed"),
                _ = signal::ctrl_c() => {
                    warn!("Interrupted, shutting down");
                    Ok(())
                }
            }
        }
    };

    shutdown(council, &config).await;
    result
}

/// Console logging per verbosity, plus a daily rolling file log when
/// `[logging] directory` is set. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8, quiet: bool, logging: &FileLoggingConfig) -> Option<WorkerGuard> {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match &logging.directory {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, "care-council.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not create log directory {} ({}), file logging disabled",
                    dir.display(),
                    e
                );
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}

fn build_council(cli: &Cli, file_config: &FileConfig, config: &CouncilConfig) -> Result<Council> {
    // === Dependency Injection ===
    let gateway: Arc<dyn LlmGateway> = if cli.offline {
        info!("Offline mode: using canned fixture replies");
        Arc::new(CannedLlmGateway::new())
    } else {
        Arc::new(
            OpenAiGateway::from_config(&file_config.gateway)
                .context("Could not create generation gateway")?,
        )
    };

    let bus = Arc::new(InProcessEventBus::new());
    let bus_observer: Arc<dyn CoordinationObserver> =
        Arc::new(BusObserver::new(Arc::clone(&bus) as Arc<dyn EventBus>));
    let mut observers = CompositeObserver::new(vec![bus_observer]);
    if let Some(path) = &file_config.logging.event_log
        && let Some(logger) = JsonlEventLogger::new(path)
    {
        info!(path = %logger.path().display(), "Writing coordination events");
        observers.push(Arc::new(logger));
    }
    let observer: Arc<dyn CoordinationObserver> = Arc::new(observers);

    let escalations = bus.subscribe(
        "council.escalation_triggered",
        Arc::new(|_channel: &str, payload: &Value| {
            let session = payload["session_id"].as_str().unwrap_or("unknown");
            let tier = payload["risk_tier"].as_str().unwrap_or("unknown");
            let reason = payload["reason"].as_str().unwrap_or("unknown");
            warn!(session, risk_tier = tier, "Escalation: {}", reason);
        }),
    );

    let registry = AgentRegistry::with_all_agents(
        gateway,
        Arc::clone(&observer),
        config.runtime.clone(),
        CrisisFallbackScorer::default(),
    );
    let workflow = Arc::new(CollaborationWorkflow::new(
        registry.clone(),
        Arc::clone(&bus) as Arc<dyn EventBus>,
        Arc::clone(&observer),
        config.collaboration.clone(),
    ));
    let engine = Arc::new(
        CoordinationEngine::new(registry.clone(), observer, config.coordination.clone())
            .with_escalation_handler(workflow.clone()),
    );

    let cancel = CancellationToken::new();
    let mut monitors =
        registry.spawn_health_monitors(config.runtime.health_check_interval, &cancel);
    monitors.push(workflow.spawn_monitor(config.collaboration.monitor_interval, cancel.child_token()));

    Ok(Council {
        registry,
        engine,
        cancel,
        monitors,
        _escalations: escalations,
    })
}

async fn shutdown(council: Council, config: &CouncilConfig) {
    council.cancel.cancel();
    for monitor in council.monitors {
        let _ = monitor.await;
    }
    let forced = council
        .registry
        .shutdown_all(config.runtime.shutdown_grace)
        .await;
    if forced > 0 {
        warn!(forced, "Calls still in flight at shutdown were cleared");
    }
}
