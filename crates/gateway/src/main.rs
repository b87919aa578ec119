use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

use gc_context::ContextEngine;
use gc_domain::config::Config;
use gc_domain::event::InboundMessage;
use gc_provider::{OpenAiProvider, RetryPolicy};
use gc_store::{ArtifactStore, EventStore, SessionStore, TaskStore};
use gc_tools::bash::BashTool;
use gc_tools::memory::{MemoryDeleteTool, MemoryFile, MemoryListTool, MemorySaveTool};
use gc_tools::read_url::ReadUrlTool;
use gc_tools::web_search::BraveSearchTool;
use gc_tools::ToolRegistry;

use gc_gateway::api;
use gc_gateway::cancel::CancelToken;
use gc_gateway::channels::telegram::{TelegramChannel, TelegramSender};
use gc_gateway::cli::{self, Cli, Command};
use gc_gateway::delivery::DeliveryRegistry;
use gc_gateway::gateway::{Gateway, RunOptions};
use gc_gateway::queue::Queue;
use gc_gateway::runtime::AgentRuntime;
use gc_gateway::scheduler::{ScheduleHandler, Scheduler};
use gc_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let config = cli::load_config(&cli.config)?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(command)) => cli::config_command(&cli.config, command),
        Some(Command::Version) => {
            println!("gopherclaw {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gc_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("gopherclaw starting");
    config.validate()?;
    std::fs::create_dir_all(&config.data_dir)?;

    // ── PID file ─────────────────────────────────────────────────────
    let pid_path = config.pid_path();
    let mut pid_handle = Some(cli::pid::write_pid_file(&pid_path)?);

    // ── Stores ───────────────────────────────────────────────────────
    let sessions = Arc::new(SessionStore::new(&config.data_dir)?);
    let events = Arc::new(EventStore::new(&config.data_dir));
    let artifacts = Arc::new(ArtifactStore::new(&config.data_dir));
    let tasks = Arc::new(TaskStore::new(&config.data_dir)?);

    // ── Tools ────────────────────────────────────────────────────────
    let memory = MemoryFile::new(config.memory_path());
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(BashTool::new(Duration::from_secs(config.tools.bash_timeout_secs))));
    registry.register(Arc::new(ReadUrlTool::new()));
    registry.register(Arc::new(MemorySaveTool(memory.clone())));
    registry.register(Arc::new(MemoryDeleteTool(memory.clone())));
    registry.register(Arc::new(MemoryListTool(memory)));
    if !config.tools.brave_api_key.is_empty() {
        registry.register(Arc::new(BraveSearchTool::new(
            config.tools.brave_endpoint.clone(),
            config.tools.brave_api_key.clone(),
        )));
    } else {
        tracing::warn!("tools.brave_api_key not set; brave_search disabled");
    }
    let registry = Arc::new(registry);
    tracing::info!(tools = ?registry.names(), "tool registry ready");

    // ── LLM provider + context engine ────────────────────────────────
    let provider = Arc::new(OpenAiProvider::new(&config.llm));
    let engine = Arc::new(ContextEngine::new(
        &config.llm.model,
        config.llm.max_tokens,
        config.llm.output_reserve,
        config.memory_path(),
    ));

    // ── Runtime, queue, gateway ──────────────────────────────────────
    let cancel = CancelToken::new();
    let runtime = Arc::new(AgentRuntime::new(
        sessions.clone(),
        events.clone(),
        artifacts.clone(),
        registry.clone(),
        provider,
        engine,
        RetryPolicy::default(),
        config.llm.max_rounds,
        cancel.clone(),
    ));
    let queue = Arc::new(Queue::new(config.queue.max_concurrent, runtime, cancel.clone()));
    let gateway = Arc::new(Gateway::new(sessions.clone(), queue.clone()));

    // ── Delivery registry + scheduler ────────────────────────────────
    let deliveries = Arc::new(DeliveryRegistry::new());
    let scheduler = Arc::new(Scheduler::new(
        tasks.clone(),
        cron_handler(gateway.clone(), deliveries.clone()),
    ));
    scheduler.start();

    // ── Telegram channel ─────────────────────────────────────────────
    if !config.telegram.bot_token.is_empty() {
        deliveries.register("telegram:", Arc::new(TelegramSender::new(&config.telegram.bot_token)));
        let channel = Arc::new(TelegramChannel::new(&config.telegram, gateway.clone()));
        tokio::spawn(channel.run(cancel.clone()));
    } else {
        tracing::warn!("telegram.bot_token not set; telegram channel disabled");
    }

    // ── Webhook HTTP server ──────────────────────────────────────────
    let state = AppState {
        config: config.clone(),
        sessions,
        events,
        artifacts,
        tasks,
        gateway: gateway.clone(),
    };
    let listener = tokio::net::TcpListener::bind(&config.webhook.listen_addr).await?;
    tracing::info!(addr = %config.webhook.listen_addr, "webhook server listening");
    let http_cancel = cancel.clone();
    tokio::spawn(async move {
        let app = api::router(state);
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { http_cancel.cancelled().await })
            .await
        {
            tracing::error!(error = %e, "webhook server failed");
        }
    });

    // ── Signal loop ──────────────────────────────────────────────────
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => tracing::info!("SIGINT received"),
        _ = sigterm.recv() => tracing::info!("SIGTERM received"),
        _ = sighup.recv() => {
            tracing::info!("SIGHUP received, re-executing");
            drain(&scheduler, &cancel, &queue).await;
            if let Some(handle) = pid_handle.take() {
                cli::pid::remove_pid_file(&pid_path, handle);
            }
            let err = reexec();
            // Only reached when exec failed: recreate the PID file so the
            // state on disk stays honest, then bail out.
            let _restored = cli::pid::write_pid_file(&pid_path)?;
            return Err(anyhow::anyhow!("re-exec failed: {err}"));
        }
    }

    // ── Graceful shutdown ────────────────────────────────────────────
    drain(&scheduler, &cancel, &queue).await;
    if let Some(handle) = pid_handle.take() {
        cli::pid::remove_pid_file(&pid_path, handle);
    }
    tracing::info!("gopherclaw stopped");
    Ok(())
}

/// Stop the scheduler, cancel the root, and let the lanes drain.
async fn drain(scheduler: &Scheduler, cancel: &CancelToken, queue: &Queue) {
    scheduler.stop().await;
    cancel.cancel();
    if !queue.wait_idle(Duration::from_secs(10)).await {
        tracing::warn!("lanes still busy after 10s, abandoning in-flight runs");
    }
    queue.stop().await;
}

/// Replace the current process with a fresh copy of itself (same argv
/// and environment). Returns only on failure.
fn reexec() -> std::io::Error {
    use std::os::unix::process::CommandExt;

    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => return e,
    };
    std::process::Command::new(exe)
        .args(std::env::args_os().skip(1))
        .exec()
}

/// Handler the scheduler fires for each due task: enqueue the prompt as
/// a synthetic inbound event; route any non-empty reply through the
/// delivery registry.
fn cron_handler(gateway: Arc<Gateway>, deliveries: Arc<DeliveryRegistry>) -> ScheduleHandler {
    Arc::new(move |session_key: String, prompt: String| {
        let deliveries = deliveries.clone();
        let delivery_key = session_key.clone();

        let options = RunOptions::new().with_on_complete(move |reply| {
            // An empty reply is the "nothing worth saying" signal.
            if reply.is_empty() {
                return;
            }
            tokio::spawn(async move {
                if let Err(e) = deliveries.deliver(&delivery_key, &reply).await {
                    tracing::warn!(session_key = %delivery_key, error = %e, "cron reply delivery failed");
                }
            });
        });

        let message = InboundMessage {
            session_key,
            text: prompt,
            source: "cron".into(),
        };
        if let Err(e) = gateway.handle_inbound(message, options) {
            tracing::warn!(error = %e, "failed to enqueue scheduled run");
        }
    })
}
