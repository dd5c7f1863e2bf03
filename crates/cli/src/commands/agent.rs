//! `librarian agent` — Single-message or interactive chat mode.

use std::io::Write;
use std::sync::Arc;

use librarian_agent::{AgentLoop, StreamEventKind, TurnRequest};
use librarian_config::AppConfig;
use librarian_core::message::ThreadId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing::debug;

pub struct AgentArgs {
    pub message: Option<String>,
    pub thread: Option<String>,
    pub model: Option<String>,
    pub stream: bool,
}

pub async fn run(args: AgentArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  WARNING: No provider API key configured.");
        eprintln!("  Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GOOGLE_API_KEY or GROQ_API_KEY,");
        eprintln!("  or add a [providers.<name>] section to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!("  Only models served by a local ollama will answer.");
        eprintln!();
    }

    let mut llm_config = config.model_config();
    if let Some(model) = args.model {
        llm_config.model = model;
    }
    let agent = librarian_gateway::build_agent(&config);
    let mut thread_id = args.thread.map(|t| ThreadId::from(&t)).unwrap_or_default();
    debug!(thread_id = %thread_id, model = %llm_config.model, stream = args.stream, "Agent command");

    if let Some(message) = args.message {
        let request = TurnRequest::user(message)
            .with_thread(thread_id.clone())
            .with_config(llm_config);
        send(&agent, request, args.stream).await?;
        eprintln!("  thread: {thread_id}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Librarian Agent — Interactive Mode");
    println!();
    println!("  Model:     {}", llm_config.model);
    println!("  Tools:     {}", agent.tools().names().join(", "));
    println!("  Thread:    {thread_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let request = TurnRequest::user(line)
            .with_thread(thread_id.clone())
            .with_config(llm_config.clone());
        match send(&agent, request, args.stream).await {
            Ok(id) => thread_id = id,
            Err(e) => eprintln!("  [Error] {e}"),
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

/// Run one turn and print its answer. Returns the thread the turn ran on.
async fn send(
    agent: &Arc<AgentLoop>,
    request: TurnRequest,
    stream: bool,
) -> Result<ThreadId, Box<dyn std::error::Error>> {
    if !stream {
        eprint!("  Thinking...");
        let result = agent.run(request).await;
        eprint!("\r              \r");
        let result = result?;
        for tool in &result.used_tools {
            eprintln!("  [tool] {}", tool.name);
        }
        println!("{}", result.answer());
        return Ok(result.thread_id);
    }

    let mut events = agent.clone().stream(request);
    let mut thread_id = None;
    while let Some(event) = events.next().await {
        thread_id.get_or_insert_with(|| event.thread_id.clone());
        match &event.kind {
            StreamEventKind::LlmTokensDelta { llm_tokens } => {
                print!("{llm_tokens}");
                std::io::stdout().flush()?;
            }
            StreamEventKind::LlmTokensCompleted { .. } => println!(),
            StreamEventKind::Error { error } => return Err(error.clone().into()),
            kind => {
                if let Some(line) = tool_line(kind) {
                    eprintln!("{line}");
                }
            }
        }
    }
    thread_id.ok_or_else(|| "stream ended without events".into())
}

/// Progress line for a tool event.
fn tool_line(kind: &StreamEventKind) -> Option<String> {
    match kind {
        StreamEventKind::ToolCallStart { tool_name, .. } => Some(format!("  [tool] {tool_name} ...")),
        StreamEventKind::ToolCallDelta {
            tool_name,
            tool_tokens,
            ..
        } => Some(format!("  [tool] {tool_name}: {tool_tokens}")),
        StreamEventKind::ToolCallCompleted { tool_name, .. } => Some(format!("  [tool] {tool_name} done")),
        _ => None,
    }
}
