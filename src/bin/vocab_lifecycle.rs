//! vocab-lifecycle CLI — vocabulary lifecycle engine with MCP server.
//!
//! Usage:
//!   vocab-lifecycle mcp [--transport stdio] [--db path] [--reasoner-command cmd]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vocab-lifecycle", version, about = "Vocabulary lifecycle engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP (Model Context Protocol) server
    Mcp {
        /// Transport type (currently only stdio)
        #[arg(long, default_value = "stdio")]
        transport: String,
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// Command to spawn for the reasoning provider (omit to run without one)
        #[arg(long)]
        reasoner_command: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Mcp { transport, db, reasoner_command } => {
            if transport != "stdio" {
                eprintln!("error: only 'stdio' transport is currently supported");
                std::process::exit(1);
            }
            let code = vocab_lifecycle::mcp::run_mcp_server(db, reasoner_command);
            std::process::exit(code);
        }
    }
}
