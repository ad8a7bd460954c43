//! toolgate - guarded local tool execution for a DeepSeek chat agent

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use toolgate_agent::{provider_from_config, AgentEvent, ChatRuntime, OneShot, SessionManager, ToolGate};
use toolgate_core::{GateConfig, SessionKey};
use toolgate_llm::{ContentBlock, LlmContent, LlmProvider};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Parser)]
#[command(name = "toolgate", about = "Chat agent with validated, pattern-monitored local tools")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, default_value = "toolgate.toml")]
    config: PathBuf,
    /// Project root the tools operate in (overrides the config file)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,
    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat {
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Send one message and print the reply
    Run {
        #[arg(short, long)]
        message: String,
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Ask one question without tools, with project files as context
    Ask {
        prompt: String,
        /// Project-relative files appended to the system prompt
        #[arg(short, long, num_args = 1..)]
        context: Vec<String>,
    },
    /// Ask the model to review one project file
    Analyze {
        file: String,
        #[arg(short, long)]
        question: Option<String>,
    },
    /// Exercise validation, execution and restart without the LLM
    Selftest,
    /// Inspect stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },
    /// Print the effective configuration as TOML
    Config,
    /// Show version
    Version,
}

#[derive(Subcommand)]
enum SessionsCommand {
    List,
    Show {
        name: String,
        /// Number of trailing messages to print
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    Delete {
        name: String,
    },
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "toolgate=info".into())
    };
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter());

    match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().context("--log-file must name a file")?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            tracing_subscriber::registry().with(stderr).with(file).init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(stderr).init();
            Ok(None)
        }
    }
}

fn load_config(cli: &Cli) -> GateConfig {
    let mut config = GateConfig::load(&cli.config);
    if let Some(root) = &cli.project_root {
        config.tools.project_root = root.clone();
    }
    config.llm.api_key = std::env::var(&config.llm.api_key_env)
        .ok()
        .filter(|k| !k.is_empty());
    config
}

fn session_key(config: &GateConfig, name: Option<String>) -> anyhow::Result<SessionKey> {
    let name = name.unwrap_or_else(|| config.sessions.default_session.clone());
    Ok(SessionKey::parse(name)?)
}

fn open_provider(config: &GateConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    if config.llm.api_key.is_none() {
        bail!("{} is not set", config.llm.api_key_env);
    }
    let provider = provider_from_config(&config.llm);
    info!("Using {} provider, model {}", provider.name(), config.llm.model);
    Ok(provider)
}

fn open_runtime(config: &GateConfig, session: SessionKey) -> anyhow::Result<ChatRuntime> {
    let provider = open_provider(config)?;
    let gate = ToolGate::open(config, session)?;
    Ok(ChatRuntime::new(provider, gate, config.llm.clone()))
}

/// Print streamed events; `echo_text` controls whether assistant text is shown live.
fn spawn_printer(mut rx: mpsc::Receiver<AgentEvent>, echo_text: bool) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::Text(text) if echo_text => {
                    print!("{}", text);
                    let _ = std::io::stdout().flush();
                }
                AgentEvent::ToolExecuting { name, .. } => eprintln!("\n[{}]", name),
                AgentEvent::ToolResult { name, result, is_error, .. } => {
                    let preview: String = result.chars().take(200).collect();
                    let tag = if is_error { "error" } else { "ok" };
                    eprintln!("[{} {}] {}", name, tag, preview);
                }
                AgentEvent::Error(e) => eprintln!("\n[error] {}", e),
                AgentEvent::Done { .. } if echo_text => println!(),
                _ => {}
            }
        }
    })
}

async fn run_chat(config: &GateConfig, session: SessionKey) -> anyhow::Result<()> {
    let mut runtime = open_runtime(config, session)?;
    println!(
        "toolgate v{} - session '{}' ({} messages). Commands: quit, clear, status, switch NAME",
        env!("CARGO_PKG_VERSION"),
        runtime.gate().session(),
        runtime.gate().transcript().len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else { break };
        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "clear" | "reset" => {
                let cleared = runtime.gate_mut().session_restart();
                println!("Session restarted{}", if cleared { "" } else { " (context files could not be removed)" });
            }
            "status" => {
                println!("{}", serde_json::to_string_pretty(&runtime.gate().system_status())?);
            }
            _ if input.starts_with("switch ") => {
                let name = input.trim_start_matches("switch ").trim();
                match SessionKey::parse(name) {
                    Ok(key) => {
                        runtime.gate_mut().save_transcript();
                        let gate = ToolGate::open(config, key)?;
                        runtime = ChatRuntime::new(runtime.provider().clone(), gate, config.llm.clone());
                        println!(
                            "Switched to session '{}' ({} messages)",
                            runtime.gate().session(),
                            runtime.gate().transcript().len()
                        );
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
            message => {
                let (tx, rx) = mpsc::channel(256);
                let printer = spawn_printer(rx, true);
                let result = runtime.run_turn(message, tx).await;
                let _ = printer.await;
                if let Err(e) = result {
                    eprintln!("{}", e);
                    eprintln!("{}", runtime.gate().errors().recovery_hint(&e));
                }
            }
        }
    }
    runtime.gate_mut().save_transcript();
    Ok(())
}

async fn run_once(config: &GateConfig, session: SessionKey, message: &str) -> anyhow::Result<()> {
    let mut runtime = open_runtime(config, session)?;
    let (tx, rx) = mpsc::channel(256);
    let printer = spawn_printer(rx, false);
    let result = runtime.run_turn(message, tx).await;
    let _ = printer.await;
    match result {
        Ok(summary) => {
            println!("{}", summary.text);
            Ok(())
        }
        Err(e) => bail!("{}", e),
    }
}

async fn run_ask(config: &GateConfig, prompt: &str, context: &[String]) -> anyhow::Result<()> {
    let oneshot = OneShot::new(open_provider(config)?, config.llm.clone(), &config.tools.project_root);
    match oneshot.ask(prompt, context).await {
        Ok(reply) => {
            println!("{}", reply);
            Ok(())
        }
        Err(e) => bail!("{}", e),
    }
}

async fn run_analyze(config: &GateConfig, file: &str, question: Option<&str>) -> anyhow::Result<()> {
    let oneshot = OneShot::new(open_provider(config)?, config.llm.clone(), &config.tools.project_root);
    match oneshot.analyze(file, question).await {
        Ok(reply) => {
            println!("== {} ==\n{}", file, reply);
            Ok(())
        }
        Err(e) => bail!("{}", e),
    }
}

async fn run_selftest(config: &GateConfig) -> anyhow::Result<()> {
    let session = SessionKey::parse("selftest")?;
    let mut gate = ToolGate::open(config, session.clone())?;

    let checks = [
        ("list_files", json!({})),
        ("read_file", json!({})),
        ("execute_command", json!({"command": "sudo reboot"})),
        ("read_file", json!({"file_path": "../outside"})),
    ];
    for (tool, params) in checks {
        let params = params.as_object().cloned().unwrap_or_default();
        let outcome = gate.execute_tool(tool, params).await;
        let first_line = outcome.result.lines().next().unwrap_or("");
        println!("{:<16} {:?}: {}", tool, outcome.status, first_line);
    }

    let status = gate.system_status();
    println!(
        "calls={} errors={} pattern={}",
        status.patterns.total_calls, status.patterns.error_count, status.patterns.pattern
    );

    let restarted = gate.session_restart();
    println!("restart: {}", if restarted { "ok" } else { "failed" });
    let mut sessions = SessionManager::new(config.context_dir())?;
    sessions.clear_context(&session);
    Ok(())
}

fn describe(content: &LlmContent) -> String {
    match content {
        LlmContent::Text(text) => text.clone(),
        LlmContent::Blocks(blocks) => blocks
            .iter()
            .map(|b| match b {
                ContentBlock::Text { text } => text.clone(),
                ContentBlock::ToolUse { name, input, .. } => format!("[tool_use {} {}]", name, input),
                ContentBlock::ToolResult { content, is_error, .. } => {
                    let preview: String = content.chars().take(120).collect();
                    let tag = if is_error.unwrap_or(false) { "error" } else { "result" };
                    format!("[tool_{} {}]", tag, preview)
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn run_sessions(config: &GateConfig, action: SessionsCommand) -> anyhow::Result<()> {
    let mut sessions = SessionManager::new(config.context_dir())?;
    match action {
        SessionsCommand::List => {
            for record in sessions.sessions() {
                println!(
                    "{:<20} messages={:<5} last_accessed={}",
                    record.session_name,
                    record.message_count,
                    record.last_accessed.format("%Y-%m-%d %H:%M:%S")
                );
            }
            for summary in sessions.list_transcripts() {
                let last: String = summary
                    .last_user_message
                    .unwrap_or_default()
                    .chars()
                    .take(60)
                    .collect();
                println!("  {} ({} messages) {}", summary.name, summary.message_count, last);
            }
        }
        SessionsCommand::Show { name, limit } => {
            let key = SessionKey::parse(name)?;
            let messages = sessions.read_transcript(&key);
            let skip = messages.len().saturating_sub(limit);
            for msg in &messages[skip..] {
                println!("{}: {}", msg.role, describe(&msg.content));
            }
        }
        SessionsCommand::Delete { name } => {
            let key = SessionKey::parse(name)?;
            if !sessions.clear_context(&key) {
                bail!("failed to clear session {}", key);
            }
            println!("Deleted session {}", key);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;
    let config = load_config(&cli);

    match cli.command {
        Some(Commands::Chat { session }) => run_chat(&config, session_key(&config, session)?).await?,
        Some(Commands::Run { message, session }) => {
            run_once(&config, session_key(&config, session)?, &message).await?
        }
        Some(Commands::Ask { prompt, context }) => run_ask(&config, &prompt, &context).await?,
        Some(Commands::Analyze { file, question }) => {
            run_analyze(&config, &file, question.as_deref()).await?
        }
        Some(Commands::Selftest) => run_selftest(&config).await?,
        Some(Commands::Sessions { action }) => run_sessions(&config, action)?,
        Some(Commands::Config) => print!("{}", config.to_toml()),
        Some(Commands::Version) => println!("toolgate v{}", env!("CARGO_PKG_VERSION")),
        // No subcommand = chat
        None => run_chat(&config, session_key(&config, None)?).await?,
    }

    Ok(())
}
