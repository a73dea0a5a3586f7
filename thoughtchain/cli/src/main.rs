//! Thoughtchain CLI
//!
//! Sends one query to the chat server and streams every department's
//! reasoning to stderr as it is reassembled. The final answer is written to
//! stdout once the stream ends.
//!
//! # Usage
//!
//! ```bash
//! # Ask the default server (http://127.0.0.1:8000)
//! thoughtchain "What is the capital of France?"
//!
//! # Another server, continuing a thread
//! thoughtchain --api-url https://chat.example.com --chat-path v1/chat --thread-id 42 "And Spain?"
//!
//! # With config file and verbose logging
//! RUST_LOG=debug thoughtchain --config ./thoughtchain.toml "hello"
//! ```
//!
//! # Exit Codes
//!
//! - `0`: the answer completed
//! - `1`: the stream failed
//! - `130`: interrupted with Ctrl-C

mod render;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use thoughtchain_core::{
    load_config_from_path, ChatSessionController, ChatStatus, ConfigOverrides, SseTransport,
};

use render::ThoughtPrinter;

/// Exit code used when interrupted
const EXIT_INTERRUPTED: u8 = 130;

/// Thoughtchain - stream a reasoning chain and its answer
#[derive(Parser, Debug)]
#[command(name = "thoughtchain")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "THOUGHTCHAIN_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Chat server base URL (overrides config and environment)
    #[arg(short = 'u', long, value_name = "URL")]
    api_url: Option<String>,

    /// Streaming endpoint path relative to the base URL
    #[arg(short = 'p', long, value_name = "PATH")]
    chat_path: Option<String>,

    /// Conversation thread id (random when omitted)
    #[arg(short = 't', long, env = "THOUGHTCHAIN_THREAD_ID")]
    thread_id: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "THOUGHTCHAIN_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// The question to ask
    #[arg(required = true, value_name = "QUERY")]
    query: Vec<String>,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("thoughtchain={level},thoughtchain_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config_path = args
        .config
        .clone()
        .or_else(thoughtchain_core::default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(url) = args.api_url.clone() {
        overrides = overrides.with_base_url(url);
    }
    if let Some(path) = args.chat_path.clone() {
        overrides = overrides.with_chat_path(path);
    }
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(url = %config.chat_url()?, source = %config.source(), "Using chat endpoint");

    let transport = SseTransport::from_config(&config)?;
    let mut controller = ChatSessionController::with_config(transport, &config);

    let thread_id = args
        .thread_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let query = args.query.join(" ");

    if let Err(e) = controller.submit(thread_id, query).await {
        eprintln!("error: {e}");
        return Ok(ExitCode::FAILURE);
    }

    let mut printer = ThoughtPrinter::new();
    let mut stderr = std::io::stderr();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let outcome = tokio::select! {
            _ = &mut ctrl_c => None,
            outcome = controller.next_event() => Some(outcome),
        };

        match outcome {
            None => {
                warn!("Interrupted, cancelling stream");
                controller.cancel();
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
            Some(None) => break,
            Some(Some(_)) => {
                printer.render(&controller.snapshot(), &mut stderr)?;
            }
        }
    }

    let snapshot = controller.snapshot();
    printer.render(&snapshot, &mut stderr)?;

    match snapshot.status {
        ChatStatus::Done => {
            let mut stdout = std::io::stdout();
            writeln!(stdout, "{}", snapshot.final_answer)?;
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            if let Some(error) = snapshot.error {
                eprintln!("error: {error}");
            }
            if !snapshot.final_answer.is_empty() {
                eprintln!("partial answer: {}", snapshot.final_answer);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
