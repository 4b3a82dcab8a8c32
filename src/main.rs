use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use schagent::config::Config;
use schagent::document::MemorySchematic;
use schagent::library::MemoryLibrary;
use schagent::prompts;
use schagent::session::{AgentSession, SessionEvent};
use schagent::tools::{CallQueue, CallStatus, StatusUpdate, ToolDispatcher, ToolRegistry};

/// schagent - schematic edits from a streamed model response
#[derive(Parser, Debug)]
#[command(name = "schagent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: ~/.config/schagent/config.toml)
    #[arg(short, long, env = "SCHAGENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a recorded model response through the agent against an empty sheet
    Replay {
        /// Recorded response text
        path: PathBuf,

        /// Bytes per chunk fed to the demultiplexer
        #[arg(long, default_value_t = 16)]
        chunk_size: usize,

        /// Extra TOML symbol library (repeatable)
        #[arg(long = "library")]
        libraries: Vec<PathBuf>,

        /// Print the resulting document as JSON
        #[arg(long)]
        dump: bool,

        /// Echo reasoning text to stderr
        #[arg(long)]
        show_reasoning: bool,
    },
    /// Print the system prompt, and optionally a wrapped user request
    Prompt {
        #[arg(long)]
        request: Option<String>,
    },
    /// List the enabled tools
    Tools,
}

fn init_logging(config: &Config) -> Result<()> {
    let path = config.general.log_path();
    let log_file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(log_file).with_ansi(false))
        .init();
    Ok(())
}

/// Built-in symbols, then config libraries, then command line libraries
fn load_library(config: &Config, extra: &[PathBuf]) -> Result<MemoryLibrary> {
    let mut library = MemoryLibrary::builtin().context("Failed to load built-in symbols")?;
    for path in config.library.paths.iter().chain(extra) {
        let loaded = MemoryLibrary::load(path)
            .with_context(|| format!("Failed to load symbol library: {}", path.display()))?;
        tracing::info!("Loaded {} symbols from {}", loaded.len(), path.display());
        library.merge(loaded);
    }
    Ok(library)
}

fn print_status(update: &StatusUpdate) {
    match (update.status, &update.response) {
        (CallStatus::Queued | CallStatus::Running, _) => {}
        (status, Some(response)) => {
            eprintln!("[{} {}] {}: {}", update.call_id, update.name, status_label(status), response)
        }
        (status, None) => eprintln!("[{} {}] {}", update.call_id, update.name, status_label(status)),
    }
}

fn status_label(status: CallStatus) -> &'static str {
    match status {
        CallStatus::Queued => "queued",
        CallStatus::Running => "running",
        CallStatus::Completed => "completed",
        CallStatus::Failed => "failed",
        CallStatus::Cancelled => "cancelled",
    }
}

async fn replay(
    config: &Config,
    path: &Path,
    chunk_size: usize,
    libraries: &[PathBuf],
    dump: bool,
    show_reasoning: bool,
) -> Result<()> {
    if chunk_size == 0 {
        bail!("--chunk-size must be at least 1");
    }
    let input = std::fs::read(path)
        .with_context(|| format!("Failed to read recorded response: {}", path.display()))?;

    let library = load_library(config, libraries)?;
    let registry = ToolRegistry::with_enabled(&config.tools.enabled);
    let dispatcher = ToolDispatcher::new(registry, MemorySchematic::new(), Arc::new(library))
        .with_settings(config.tool_settings());

    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
    let (queue, task) = CallQueue::spawn(dispatcher, updates_tx);
    let status_printer = tokio::spawn(async move {
        let mut failed = 0usize;
        while let Some(update) = updates_rx.recv().await {
            if update.status == CallStatus::Failed {
                failed += 1;
            }
            print_status(&update);
        }
        failed
    });

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let event_printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                SessionEvent::TextDelta(text) => print!("{}", text),
                SessionEvent::ReasoningDelta(text) if show_reasoning => eprint!("{}", text),
                SessionEvent::ReasoningDelta(_) => {}
                SessionEvent::ToolQueued { call_id, name } => {
                    tracing::debug!("{} queued as {}", name, call_id);
                }
                SessionEvent::Finished(summary) => return Some(summary),
            }
        }
        None
    });

    let mut session = AgentSession::new(&config.stream, queue.clone(), events_tx);
    tracing::info!(
        "Replaying {} ({} bytes) in {} byte chunks",
        path.display(),
        input.len(),
        chunk_size
    );
    for chunk in input.chunks(chunk_size) {
        session.feed_bytes(chunk)?;
    }
    session.finish()?;
    drop(session);

    queue.idle().await?;
    queue.shutdown();
    let dispatcher = task.join().await?;
    let failed = status_printer.await?;
    let summary = event_printer.await?;

    if let Some(summary) = summary {
        eprintln!(
            "{} tool calls, {} failed, {} tool lines discarded{}",
            summary.calls.len(),
            failed,
            summary.discarded_tool_lines,
            if summary.unterminated_reasoning {
                ", reasoning left open"
            } else {
                ""
            }
        );
    }

    if dump {
        let json = serde_json::to_string_pretty(dispatcher.document())
            .context("Failed to serialize document")?;
        println!("{}", json);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env files (local first, then home directory)
    // Errors are ignored - files are optional
    let _ = dotenvy::from_filename(".env");
    if let Some(home) = dirs::home_dir() {
        let _ = dotenvy::from_path(home.join(".env"));
    }

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    init_logging(&config)?;

    match args.command {
        Command::Replay {
            path,
            chunk_size,
            libraries,
            dump,
            show_reasoning,
        } => replay(&config, &path, chunk_size, &libraries, dump, show_reasoning).await,
        Command::Prompt { request } => {
            let registry = ToolRegistry::with_enabled(&config.tools.enabled);
            println!("{}", prompts::system_prompt(&registry, &config.stream));
            if let Some(request) = request {
                println!("{}", prompts::user_prompt(&request));
            }
            Ok(())
        }
        Command::Tools => {
            let registry = ToolRegistry::with_enabled(&config.tools.enabled);
            for entry in registry.values() {
                println!("{:<36} {}", entry.tool.name(), entry.tool.description());
            }
            Ok(())
        }
    }
}
