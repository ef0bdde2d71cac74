//! colloquy - terminal client for AG-UI style agent servers

mod config;
mod ui;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use colloquy_client::{Client, HttpTransport, RenderSink};
use colloquy_protocol::ThreadId;

use crate::config::Config;
use crate::ui::TerminalSink;

/// Default server base URL when neither flag nor config names one
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

/// colloquy - talk to an agent server and keep its history in sync
#[derive(Parser, Debug)]
#[command(name = "colloquy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server base URL (default: http://127.0.0.1:8000)
    #[arg(short, long)]
    server: Option<String>,

    /// List known conversations and exit
    #[arg(long)]
    list: bool,

    /// Resume a persisted conversation by id
    #[arg(short = 'r', long)]
    conversation: Option<String>,

    /// Dump the raw persisted log for a conversation and exit
    #[arg(long)]
    dump: Option<String>,

    /// Run a single prompt non-interactively and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

fn init_tracing(verbose: bool, config: &Config) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| config.log.clone())
        .unwrap_or_else(|| if verbose { "debug" } else { "info" }.to_string());

    // Logs go to stderr so the transcript on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load();
    init_tracing(args.verbose, &config);

    if args.init_config {
        let path = Config::init().context("failed to write config file")?;
        println!("Config file: {}", path.display());
        return Ok(());
    }

    let server = args
        .server
        .or_else(|| config.server.clone())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    tracing::debug!(%server, "connecting");

    let transport = Arc::new(HttpTransport::new(&server));
    let mut client = Client::new(transport);

    if args.list {
        for thread_id in client.conversations().await? {
            println!("{}", thread_id);
        }
        return Ok(());
    }

    if let Some(id) = args.dump {
        let raw = client.raw_messages(&ThreadId::new(id)).await?;
        println!("{}", serde_json::to_string_pretty(&raw)?);
        return Ok(());
    }

    let mut sink = TerminalSink::new();

    if let Some(id) = args.conversation {
        client
            .rehydrate(ThreadId::new(&*id), &mut sink)
            .await
            .with_context(|| format!("could not resume conversation {}", id))?;
    }

    if let Some(prompt) = args.command {
        run_prompt(&mut client, &prompt, &mut sink).await;
        return Ok(());
    }

    repl(&mut client, &mut sink).await
}

/// Drive one prompt to a terminal state and refresh the conversation
/// list afterwards, even when the run failed.
async fn run_prompt(client: &mut Client, prompt: &str, sink: &mut TerminalSink) {
    let result = client.submit(prompt, sink).await;
    sink.finish_run();
    if let Err(e) = result {
        eprintln!("run failed: {}", e);
    }
    match client.conversations().await {
        Ok(threads) => tracing::debug!(count = threads.len(), "refreshed conversation list"),
        Err(e) => tracing::warn!("conversation list refresh failed: {}", e),
    }
}

async fn repl(client: &mut Client, sink: &mut TerminalSink) -> anyhow::Result<()> {
    println!("conversation {}", client.thread_id());
    println!("/list /switch <id> /new /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("/quit", _) | ("/exit", _) => break,
            ("/list", _) => match client.conversations().await {
                Ok(threads) => {
                    for thread_id in threads {
                        println!("{}", thread_id);
                    }
                }
                Err(e) => eprintln!("could not list conversations: {}", e),
            },
            ("/new", _) => {
                client.start_new_conversation();
                sink.clear();
                println!("conversation {}", client.thread_id());
            }
            ("/switch", id) if !id.is_empty() => {
                match client.rehydrate(ThreadId::new(id), sink).await {
                    Ok(()) => println!("conversation {}", client.thread_id()),
                    // Failed switches leave the previous conversation current.
                    Err(e) => eprintln!("could not switch: {}", e),
                }
            }
            ("/switch", _) => eprintln!("usage: /switch <conversation-id>"),
            (cmd, _) if cmd.starts_with('/') => eprintln!("unknown command: {}", cmd),
            _ => run_prompt(client, line, sink).await,
        }
    }

    Ok(())
}
