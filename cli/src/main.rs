//! CLI entrypoint for wallbounce
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod args;
mod logging;
mod output;
mod progress;
mod reviewer;

use anyhow::{Context, Result, bail};
use args::{Cli, OutputFormat, ReviewerKind};
use clap::Parser;
use colored::Colorize;
use output::ConsoleFormatter;
use progress::ProgressReporter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wallbounce_application::{
    AnalysisOutcome, ApprovalReviewer, AuditLog, AutoApproveReviewer, AutoDenyReviewer,
    InMemoryAuditLog, ResultCache, RunAnalysisUseCase,
};
use wallbounce_domain::{AnalysisRequest, ExecutionOptions, SensitiveOperation};
use wallbounce_infrastructure::{
    ChannelApprovalReviewer, ConfigLoader, InMemoryMetrics, InMemoryResultCache, JsonlAuditLog,
    ProviderRegistry,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose, cli.log_dir.as_deref());

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(());
    }

    // === Configuration ===
    if let Some(path) = &cli.config
        && !path.exists()
    {
        bail!("Config file not found: {}", path.display());
    }
    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?
    };

    let issues = file_config.validate();
    for issue in issues.iter().filter(|i| !i.is_error()) {
        warn!("{}", issue);
    }
    let errors: Vec<String> = issues
        .iter()
        .filter(|i| i.is_error())
        .map(ToString::to_string)
        .collect();
    if !errors.is_empty() {
        bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }

    let mut config = file_config.to_engine_config();
    if cli.full_traffic {
        config.rollout.steps = vec![100];
    }

    // === Dependency Injection ===
    let providers = ProviderRegistry::build(&file_config.providers)
        .context("Failed to set up providers")?;
    info!(providers = providers.len(), "Starting wallbounce");

    let cache: Arc<dyn ResultCache> = Arc::new(InMemoryResultCache::new(
        file_config.cache.max_entries,
    ));
    let audit: Arc<dyn AuditLog> = match file_config.audit.resolved_path() {
        Some(path) => Arc::new(
            JsonlAuditLog::open(&path)
                .with_context(|| format!("Failed to open audit log {}", path.display()))?,
        ),
        None => Arc::new(InMemoryAuditLog::new()),
    };
    let metrics = Arc::new(InMemoryMetrics::new());

    let mut console_reviewer = None;
    let approval: Arc<dyn ApprovalReviewer> = match cli.review {
        ReviewerKind::AutoApprove => Arc::new(AutoApproveReviewer),
        ReviewerKind::AutoDeny => Arc::new(AutoDenyReviewer),
        ReviewerKind::Interactive => {
            let (channel, tickets) = ChannelApprovalReviewer::channel(4);
            console_reviewer = Some(reviewer::spawn_console_reviewer(tickets));
            Arc::new(channel)
        }
    };

    let cancellation = CancellationToken::new();
    {
        let token = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        });
    }

    let use_case = RunAnalysisUseCase::builder(config, providers.into_providers())
        .with_cache(cache)
        .with_reviewer(approval)
        .with_audit_log(audit)
        .with_metrics(metrics)
        .with_cancellation(cancellation)
        .build()?;

    if cli.check_providers {
        for (id, healthy) in use_case.check_providers().await {
            let status = if healthy {
                "ok".green()
            } else {
                "unavailable".red()
            };
            println!("{:<24} {}", id.to_string(), status);
        }
        return Ok(());
    }

    // === Request ===
    let prompt = match cli.prompt {
        Some(p) => p,
        None => bail!("A prompt is required. Use --check-providers to only test providers."),
    };

    let mut options = if cli.sequential {
        ExecutionOptions::sequential()
    } else {
        ExecutionOptions::default()
    };
    if let Some(max_tokens) = cli.max_tokens {
        options = options.with_max_tokens(max_tokens);
    }
    if let Some(temperature) = cli.temperature {
        options = options.with_temperature(temperature);
    }

    let mut request = AnalysisRequest::new(prompt, cli.task_type.into())?.with_options(options);
    if let Some(session) = cli.session {
        request = request.with_session(session);
    }
    for marker in &cli.sensitive {
        let operation: SensitiveOperation = marker.parse()?;
        request = request.with_sensitive_operation(operation);
    }

    let outcome = if cli.quiet {
        use_case.execute(request).await?
    } else {
        let progress = ProgressReporter::new();
        use_case.execute_with_progress(request, &progress).await?
    };

    match outcome {
        AnalysisOutcome::Legacy { request } => {
            eprintln!(
                "{} request {} was not selected by the current rollout step; \
                 rerun with --full-traffic to route it through the engine",
                "->".yellow(),
                request.id()
            );
        }
        AnalysisOutcome::Engine(response) => {
            let output = match cli.output {
                OutputFormat::Text => ConsoleFormatter::format(&response),
                OutputFormat::Json => {
                    ConsoleFormatter::format_json(&response, &use_case.metrics_snapshot())
                }
            };
            println!("{}", output);
        }
    }

    use_case.drain_pending_reviews().await;
    drop(use_case);
    if let Some(handle) = console_reviewer {
        handle.abort();
    }

    Ok(())
}
