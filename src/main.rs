mod backend;
mod config;
mod diagnostic;
mod error;
mod executor;
mod logging;
mod mcp;
mod normalize;
mod registry;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use crate::config::{ServerConfig, DEFAULT_ES_URL, DEFAULT_SAMPLE_SIZE, ES_URL_ENV};
use crate::logging::DEFAULT_LOG_LEVEL;
use crate::mcp::run_mcp_stdio;
use crate::registry::ToolRegistry;

#[derive(Debug, Parser)]
#[command(name = "elastic-mcp")]
#[command(about = "Elasticsearch tools for AI agents over MCP stdio", version)]
struct Cli {
    /// Log level for stderr diagnostics; RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run as an MCP stdio server for agent/tool integration.
    Mcp(McpArgs),
    /// Print the tool catalog answered to `tools/list`.
    Tools,
    /// Print generic MCP client config JSON snippet.
    PrintMcpConfig(PrintMcpConfigArgs),
}

#[derive(Debug, Args)]
struct McpArgs {
    /// Base URL of the Elasticsearch-compatible backend.
    #[arg(long, env = ES_URL_ENV, default_value = DEFAULT_ES_URL)]
    es_url: String,
    /// Documents returned by `sample_docs` when the caller gives no size.
    #[arg(long, default_value_t = DEFAULT_SAMPLE_SIZE)]
    sample_size: u64,
}

#[derive(Debug, Args)]
struct PrintMcpConfigArgs {
    #[arg(long, default_value = "elastic")]
    name: String,
    #[arg(long, default_value = "elastic-mcp")]
    command: String,
    /// Backend URL to pass to the server through its environment.
    #[arg(long)]
    es_url: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match cli.command {
        Commands::Mcp(args) => run_mcp(args),
        Commands::Tools => run_tools(),
        Commands::PrintMcpConfig(args) => run_print_mcp_config(args),
    }
}

fn run_mcp(args: McpArgs) -> Result<()> {
    let config = ServerConfig::new(&args.es_url, args.sample_size)
        .context("invalid server configuration")?;
    run_mcp_stdio(config)
}

fn run_tools() -> Result<()> {
    let registry = ToolRegistry::new();
    print_json(&registry.descriptors())
}

fn run_print_mcp_config(args: PrintMcpConfigArgs) -> Result<()> {
    let mut server = json!({
        "command": args.command,
        "args": ["mcp"],
    });
    if let Some(es_url) = args.es_url {
        let es_url = config::normalize_base_url(&es_url)?;
        server["env"] = json!({ ES_URL_ENV: es_url });
    }

    let snippet = json!({
        "mcpServers": {
            args.name: server
        }
    });

    print_json(&snippet)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
