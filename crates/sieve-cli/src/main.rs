//! Sieve CLI - run scripts locally, hand back only the summary
//!
//! Usage:
//!   sieve serve            Stdio MCP server
//!   sieve run <FILE>       Execute a script once and print the result
//!   sieve check <FILE>     Validate a script without running it
//!   sieve tools [QUERY]    List tools, ranked by a query

mod config;
mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sieve_core::McpServer;
use sieve_sandbox::{ExecutionRequest, Executor, Language};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::GatewayConfig;

#[derive(Parser)]
#[command(name = "sieve")]
#[command(author, version, about = "Local script execution gateway for agents")]
#[command(
    long_about = "Sieve - run a script over local data and return a bounded result.\n\n\
    Scripts run with a hard timeout and output cap; the raw data never leaves the machine."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.sieve/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve tools over MCP on stdin/stdout
    Serve,

    /// Execute a script file and print the result as JSON
    Run {
        /// Script to execute
        file: PathBuf,

        /// Timeout in milliseconds (capped at 30000)
        #[arg(long)]
        timeout_ms: Option<i64>,

        /// Script language
        #[arg(long, default_value = "python")]
        language: String,
    },

    /// Check a script against the policy without running it
    Check {
        /// Script to check
        file: PathBuf,
    },

    /// List available tools, most relevant first
    Tools {
        /// Free-text query
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries protocol frames and results, so logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let gateway = GatewayConfig::load(cli.config.as_deref())?;
    let executor = Arc::new(Executor::new(gateway.sandbox_config()));

    match cli.command {
        Commands::Serve => {
            let server = Arc::new(McpServer::new(executor));
            serve::serve_stdio(server).await?;
        }

        Commands::Run {
            file,
            timeout_ms,
            language,
        } => {
            let language: Language = language.parse()?;
            let code = read_script(&file)?;
            let mut request = ExecutionRequest::new(language, code);
            request.timeout_ms = timeout_ms;

            let result = executor.run(&request).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }

        Commands::Check { file } => {
            let code = read_script(&file)?;
            match executor.validate(&code) {
                Ok(()) => println!("ok"),
                Err(e) => {
                    println!("rejected: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Tools { query } => {
            let query = query.join(" ");
            let tools = sieve_core::discover(&query, usize::MAX);
            if tools.is_empty() {
                println!("No tools match '{}'", query);
            }
            for tool in tools {
                println!("{}\n    {}\n", tool.name, tool.description);
            }
        }
    }

    Ok(())
}

fn read_script(path: &std::path::Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read script {}", path.display()))
}
