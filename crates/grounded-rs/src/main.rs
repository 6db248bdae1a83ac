//! Summarize an observed page with grounding checks.
//!
//! Reads a JSON request `{ "observation": ..., "plan": ... }` from a file or
//! stdin. The OpenRouter API key comes from the `OPENROUTER_KEY` environment
//! variable.
//!
//! # Examples
//!
//! ```sh
//! # Show the digest the model would see
//! grounded digest page.json
//!
//! # Stream a grounded summary
//! cat page.json | grounded summarize
//!
//! # Judge a saved model response against the page
//! grounded audit page.json --response answer.txt
//!
//! # Machine-readable report
//! grounded summarize page.json --no-stream --json
//! ```

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use grounded_rs::DEFAULT_MODEL;
use grounded_rs::config::{SummarizerConfig, Toggle};
use grounded_rs::events::LoggingHandler;
use grounded_rs::model::openrouter::OpenRouterRunner;
use grounded_rs::model::scripted::ScriptedRunner;
use grounded_rs::pipeline::{GroundedSummarizer, SummaryResult};
use grounded_rs::request::{SummaryRequest, request_schema};
use grounded_rs::select::select_content;
use grounded_rs::stream::SummaryDelta;
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Summarize an observed page with grounding checks.
#[derive(Parser)]
#[command(name = "grounded", version)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the selected digest as JSON; no model call
    Digest(RequestArgs),

    /// Validate a saved model response against the page
    Audit {
        #[command(flatten)]
        request: RequestArgs,

        /// File holding the raw model response
        #[arg(long)]
        response: PathBuf,

        /// Print a JSON report instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run the full pipeline against OpenRouter
    Summarize {
        #[command(flatten)]
        request: RequestArgs,

        /// Model to use
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,

        /// Override the per-kind token budget (clamped to 160..=2000)
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Let the model reason before answering
        #[arg(long)]
        thinking: bool,

        /// Never condense long pages chunk by chunk
        #[arg(long)]
        no_chunking: bool,

        /// Print only the final answer
        #[arg(long)]
        no_stream: bool,

        /// Print a JSON report (implies --no-stream)
        #[arg(long)]
        json: bool,
    },

    /// Print the request JSON schema
    Schema,
}

#[derive(Args)]
struct RequestArgs {
    /// Request JSON file (reads stdin when omitted or "-")
    request: Option<PathBuf>,
}

/// `--json` output.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryReport {
    generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(flatten)]
    result: SummaryResult,
}

impl SummaryReport {
    fn new(result: SummaryResult, model: Option<String>) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            model,
            result,
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_request(args: &RequestArgs) -> Result<SummaryRequest, String> {
    match args.request.as_deref() {
        Some(path) if path.as_os_str() != "-" => {
            SummaryRequest::from_path(path).map_err(|e| e.to_string())
        }
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            SummaryRequest::from_json(&buf).map_err(|e| e.to_string())
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to serialize output: {e}"))
}

fn print_result(result: SummaryResult, model: Option<String>, json: bool) -> Result<(), String> {
    if json {
        println!("{}", to_json(&SummaryReport::new(result, model))?);
        return Ok(());
    }
    match result.outcome {
        Some(outcome) => eprintln!("  [validation] {outcome}"),
        None => eprintln!("  [validation] skipped: nothing to summarize"),
    }
    println!("{}", result.text);
    Ok(())
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received, cancelling");
            token.cancel();
        }
    });
}

// ── Subcommands ────────────────────────────────────────────────────

fn digest(args: &RequestArgs) -> Result<(), String> {
    let request = load_request(args)?;
    let input = select_content(&request.observation, &request.plan);
    println!("{}", to_json(&input)?);
    Ok(())
}

async fn audit(args: &RequestArgs, response: &Path, json: bool) -> Result<(), String> {
    let request = load_request(args)?;
    let text = std::fs::read_to_string(response)
        .map_err(|e| format!("failed to read response file '{}': {e}", response.display()))?;

    // The saved response answers the uncondensed digest.
    let runner = ScriptedRunner::new().with_response(text);
    let config = SummarizerConfig::default().with_chunking(Toggle::disabled());
    let result = GroundedSummarizer::new(config)
        .with_runner(&runner)
        .with_event_handler(&LoggingHandler)
        .summarize(&request.observation, &request.plan)
        .await
        .map_err(|e| e.to_string())?;
    print_result(result, None, json)
}

async fn summarize(
    args: &RequestArgs,
    model: &str,
    max_tokens: Option<u32>,
    thinking: bool,
    no_chunking: bool,
    no_stream: bool,
    json: bool,
) -> Result<(), String> {
    let request = load_request(args)?;
    let runner = OpenRouterRunner::from_env(model).map_err(|e| e.to_string())?;

    let mut config = SummarizerConfig::default().with_thinking(thinking);
    if let Some(max_tokens) = max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    if no_chunking {
        config = config.with_chunking(Toggle::disabled());
    }
    let summarizer = GroundedSummarizer::new(config)
        .with_runner(&runner)
        .with_event_handler(&LoggingHandler);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    if no_stream || json {
        let result = summarizer
            .summarize_cancellable(&request.observation, &request.plan, &cancel)
            .await
            .map_err(|e| e.to_string())?;
        return print_result(result, Some(runner.model().to_string()), json);
    }

    let stream = summarizer.summarize_stream(&request.observation, &request.plan, cancel.clone());
    futures::pin_mut!(stream);
    let mut stdout = io::stdout();
    let mut printed_any = false;
    while let Some(delta) = stream.next().await {
        match delta.map_err(|e| e.to_string())? {
            SummaryDelta::Text(text) => {
                print!("{text}");
                printed_any |= !text.is_empty();
            }
            // A terminal cannot retract text; mark the revision and print it whole.
            SummaryDelta::Replace(text) => {
                if printed_any {
                    println!();
                    eprintln!("  [revised answer]");
                }
                print!("{text}");
                printed_any = !text.is_empty();
            }
        }
        stdout.flush().ok();
    }
    if cancel.is_cancelled() {
        eprintln!();
        eprintln!("  [cancelled]");
    }
    println!();
    Ok(())
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Digest(args) => digest(&args),
        Command::Audit {
            request,
            response,
            json,
        } => audit(&request, &response, json).await,
        Command::Summarize {
            request,
            model,
            max_tokens,
            thinking,
            no_chunking,
            no_stream,
            json,
        } => {
            summarize(
                &request,
                &model,
                max_tokens,
                thinking,
                no_chunking,
                no_stream,
                json,
            )
            .await
        }
        Command::Schema => {
            println!("{}", to_json(&request_schema())?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
