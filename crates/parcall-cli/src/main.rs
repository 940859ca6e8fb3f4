//! Operator shell for parallel call groups
//!
//! Reads commands from stdin and runs them against a coordinator that is
//! wired to a simulated call engine. Besides the parallel call commands the
//! shell understands `answer <call-id>` and `close <call-id> [reason]`, which
//! inject the events a real engine would report.

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use rvoip_parcall_core::commands::{run_line, HELP};
use rvoip_parcall_core::testing::RecordingCallControl;
use rvoip_parcall_core::{CallEventSink, ParCallConfig, ParallelCallHandle, ParallelCallService};

use crate::logging::{parse_log_level, setup_logging, LoggingConfig};

const FALLBACK_ACCOUNT: &str = "sip:operator@localhost";

const SHELL_HELP: &str = "\
answer <call-id>                Report a call as answered
close <call-id> [reason]        Report a call as closed
help                            Show this help
quit                            Leave the shell";

#[derive(Parser, Debug)]
#[command(author, version, about = "Parallel call groups shell with a simulated call engine", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "RVOIP_PARCALL_CONFIG")]
    config: Option<PathBuf>,

    /// Extra local account, may be repeated (e.g. sip:alice@example.com)
    #[arg(short, long = "account")]
    accounts: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Include file and line information in logs
    #[arg(long)]
    file_info: bool,

    /// Log span enter and exit events
    #[arg(long)]
    log_spans: bool,
}

fn load_config(args: &Args) -> Result<ParCallConfig> {
    let mut config = match &args.config {
        Some(path) => ParCallConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ParCallConfig::default(),
    };
    for account in &args.accounts {
        config = config.with_account(account.clone());
    }
    if config.accounts.is_empty() {
        warn!("No accounts configured, using {}", FALLBACK_ACCOUNT);
        config = config.with_account(FALLBACK_ACCOUNT);
    }
    config.validate()?;
    Ok(config)
}

/// Handle shell-only commands. Returns `false` when the line is not one.
fn simulate(sink: &CallEventSink, line: &str) -> Result<bool> {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("answer") => {
            let call_id = words.next().context("usage: answer <call-id>")?;
            sink.established(call_id)?;
        }
        Some("close") => {
            let call_id = words.next().context("usage: close <call-id> [reason]")?;
            let reason = words.collect::<Vec<_>>().join(" ");
            sink.closed(call_id, (!reason.is_empty()).then_some(reason.as_str()))?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

async fn run_shell(parcall: &ParallelCallHandle) -> Result<()> {
    let sink = parcall.call_events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                println!("{}\n{}", HELP, SHELL_HELP);
                continue;
            }
            _ => {}
        }

        match simulate(&sink, line) {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                println!("{}", e);
                continue;
            }
        }

        let outcome = run_line(parcall, line).await;
        println!("{}", outcome);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = parse_log_level(&args.log_level)?;
    setup_logging(
        &LoggingConfig::new(level)
            .with_json(args.json_logs)
            .with_file_info(args.file_info)
            .with_log_spans(args.log_spans),
    )?;
    info!("Starting rvoip-parcall v{}", rvoip_parcall_core::VERSION);

    let config = load_config(&args)?;
    let identities = Arc::new(config.account_table()?);
    let control = Arc::new(RecordingCallControl::new());
    let parcall = ParallelCallService::start(config, control.clone(), identities)?;

    // Hung up calls are reported closed by the simulated engine
    control.set_event_sink(parcall.call_events());

    let mut events = parcall.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("event: {}", event),
                Err(RecvError::Lagged(missed)) => warn!("Event printer missed {} event(s)", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = run_shell(&parcall).await;

    parcall.shutdown().await?;
    printer.abort();
    result
}
