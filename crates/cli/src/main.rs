//! Librarian CLI — the main entry point.
//!
//! Commands:
//! - `gateway`  — Start the HTTP API server
//! - `agent`    — Single-message or interactive chat
//! - `tools`    — List the built-in tools
//! - `models`   — List known model identifiers

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "librarian",
    about = "Librarian — tool-augmented conversational agent runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "LIBRARIAN_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the agent
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Continue an existing thread
        #[arg(short, long)]
        thread: Option<String>,

        /// Model identifier, e.g. "openai:gpt-4o-mini"
        #[arg(long)]
        model: Option<String>,

        /// Print tokens and tool progress as they arrive
        #[arg(short, long)]
        stream: bool,
    },

    /// List the tools the agent can call
    Tools,

    /// List known model identifiers
    Models,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Agent {
            message,
            thread,
            model,
            stream,
        } => {
            commands::agent::run(commands::agent::AgentArgs {
                message,
                thread,
                model,
                stream,
            })
            .await?
        }
        Commands::Tools => commands::catalogue::tools().await?,
        Commands::Models => commands::catalogue::models().await?,
    }

    Ok(())
}
