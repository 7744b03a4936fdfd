//! Timeline CLI
//!
//! Line-oriented terminal client for the thinking timeline. Reads user input
//! from stdin, sends it to the agent event source and prints each turn as it
//! unfolds: live step lines while the assistant works, then a single
//! collapsed line and the wrapped answer.
//!
//! # Usage
//!
//! ```bash
//! # Connect to the default endpoint (ws://localhost:8003/ws/chat)
//! timeline
//!
//! # Custom endpoint with a short, fixed reconnect schedule
//! timeline --endpoint ws://agents.local:8003/ws/chat --max-attempts 3 --backoff fixed
//!
//! # Debug logging (stderr)
//! timeline -v
//! ```
//!
//! Logs go to stderr so stdout carries only the rendered timeline.

mod commands;
mod display;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use timeline_core::{
    load_config, load_config_file, BackoffPolicy, ChatSession, ClientConfig, ConfigOverrides,
    Connector, SessionUpdate, WebSocketConnector,
};

use crate::commands::{Command, HELP};
use crate::display::Display;

/// Terminal client for the multi-agent thinking timeline
#[derive(Parser, Debug)]
#[command(name = "timeline")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Event source URL (ws:// or wss://)
    #[arg(short, long, value_name = "URL")]
    endpoint: Option<String>,

    /// Configuration file (default: ~/.config/agent-timeline/client.toml)
    #[arg(short, long, env = "TIMELINE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Reconnect attempts after an unexpected close (0 = never)
    #[arg(long, value_name = "N")]
    max_attempts: Option<u32>,

    /// Base reconnect delay in milliseconds
    #[arg(long, value_name = "MS")]
    base_delay_ms: Option<u64>,

    /// Reconnect delay schedule: linear, exponential or fixed
    #[arg(long, value_name = "POLICY")]
    backoff: Option<BackoffPolicy>,

    /// Wrap answers at this many columns
    #[arg(short, long, env = "TIMELINE_WIDTH", default_value_t = 100)]
    width: usize,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref endpoint) = self.endpoint {
            overrides = overrides.with_endpoint(endpoint.clone());
        }
        if let Some(n) = self.max_attempts {
            overrides = overrides.with_max_attempts(n);
        }
        if let Some(ms) = self.base_delay_ms {
            overrides = overrides.with_base_delay_ms(ms);
        }
        if let Some(backoff) = self.backoff {
            overrides = overrides.with_backoff(backoff);
        }
        overrides
    }
}

/// What the input loop does after a command
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = resolve_config(&args)?;
    tracing::info!(
        endpoint = %config.endpoint,
        source = %config.source(),
        max_attempts = config.reconnect.max_attempts,
        backoff = %config.reconnect.backoff,
        "Starting timeline client"
    );

    let display = Display::new(args.width);
    let mut out = Output::new();

    let (mut session, mut updates) = ChatSession::start(&config, WebSocketConnector::new())
        .await
        .with_context(|| format!("Failed to connect to {}", config.endpoint))?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else {
                    tracing::debug!("Session update channel closed");
                    break;
                };
                if let Some(text) = render_update(&display, &session, &update) {
                    out.print(&text).await?;
                }
            }
            line = input.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    tracing::debug!("stdin closed");
                    break;
                };
                if handle_line(&line, &mut session, &display, &mut out).await? == Flow::Quit {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received interrupt, shutting down");
                break;
            }
        }
    }

    session.shutdown().await;
    tracing::info!("Timeline client stopped");
    Ok(())
}

/// Initialize the tracing subscriber on stderr
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("timeline_core={level},timeline={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// File (or defaults), then environment, then command-line flags
fn resolve_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match args.config {
        Some(ref path) => load_config_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => load_config().context("Failed to load configuration")?,
    };

    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn render_update<C: Connector>(
    display: &Display,
    session: &ChatSession<C>,
    update: &SessionUpdate,
) -> Option<String> {
    match update {
        SessionUpdate::Connection(status) => Some(display.connection(status)),
        SessionUpdate::Turn(change) => display.turn_change(change, &session.snapshot()),
        SessionUpdate::Failure(message) => Some(display.failure(message)),
    }
}

async fn handle_line<C: Connector>(
    line: &str,
    session: &mut ChatSession<C>,
    display: &Display,
    out: &mut Output,
) -> Result<Flow> {
    let command = match commands::parse(line) {
        Ok(command) => command,
        Err(e) => {
            out.print(&display.failure(&e.to_string())).await?;
            return Ok(Flow::Continue);
        }
    };

    match command {
        Command::Send(text) => {
            if let Err(e) = session.send(&text) {
                out.print(&display.failure(&e.to_string())).await?;
            }
        }
        Command::Expand(number) => {
            let text = display
                .expand(&session.snapshot(), number)
                .unwrap_or_else(|e| display.failure(&e));
            out.print(&text).await?;
        }
        Command::Turns => out.print(&display.turn_list(&session.snapshot())).await?,
        Command::Reconnect => {
            if let Err(e) = session.reconnect().await {
                out.print(&display.failure(&e.to_string())).await?;
            }
        }
        Command::Help => out.print(HELP).await?,
        Command::Quit => return Ok(Flow::Quit),
        Command::Empty => {}
    }
    Ok(Flow::Continue)
}

/// Non-blocking stdout
struct Output {
    stdout: tokio::io::Stdout,
}

impl Output {
    fn new() -> Self {
        Self {
            stdout: tokio::io::stdout(),
        }
    }

    async fn print(&mut self, text: &str) -> Result<()> {
        self.stdout.write_all(text.as_bytes()).await?;
        self.stdout.write_all(b"\n").await?;
        self.stdout.flush().await?;
        Ok(())
    }
}
