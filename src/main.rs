use std::error::Error;
use std::io::{self, Write};

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use brook::api::{Message, MessageKind, TodoStatus};
use brook::core::client::AgentClient;
use brook::core::config::{Config, Transport};
use brook::core::session::{ChatSession, SessionUpdate};
use brook::error::ClientError;
use brook::utils::content::extract_text;

#[derive(Parser)]
#[command(name = "brook")]
#[command(about = "A terminal chat client for deep-agent deployments")]
#[command(
    long_about = "Brook is a line-oriented terminal client for deep-agent deployments. \
It sends each message to the backend's one-shot chat endpoint and replays the \
finished reply as paced streaming output; deployments that serve real \
server-sent events can switch to the incremental transport.\n\n\
Configuration (config.toml in the platform config directory):\n\
  deployment_url    Base URL of the deployment (default http://localhost:8000)\n\
  agent_id          Agent to address (default deepagent)\n\
  access_token      Bearer token; required before any request is sent\n\
  transport         'replay' (default) or 'incremental'\n\n\
Environment Variables (override the file):\n\
  BROOK_DEPLOYMENT_URL, BROOK_AGENT_ID, BROOK_ACCESS_TOKEN, BROOK_TRANSPORT\n\n\
Commands during chat:\n\
  /stop             Stop the reply currently streaming in\n\
  /quit             Exit"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Thread to resume
    #[arg(short = 't', long, global = true, value_name = "THREAD_ID")]
    thread: Option<String>,

    /// Transport override: 'replay' or 'incremental'
    #[arg(short = 'x', long, global = true, value_name = "TRANSPORT")]
    transport: Option<Transport>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive chat (default)
    Chat,
    /// List known threads, newest first
    Threads,
}

fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::load()?;
    if let Some(transport) = args.transport {
        config.transport = transport;
    }

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Threads => list_threads(&config).await,
        Commands::Chat => run_chat(&config, args.thread).await,
    }
}

async fn list_threads(config: &Config) -> Result<(), Box<dyn Error>> {
    let Some(client) = AgentClient::from_config(config) else {
        return Err(offline_error().into());
    };

    let threads = client.search_threads().await?;
    if threads.is_empty() {
        println!("No threads yet.");
        return Ok(());
    }
    for thread in threads {
        println!(
            "{}  {}  {}",
            thread.id,
            thread.updated_at.format("%Y-%m-%d %H:%M"),
            thread.title
        );
    }
    Ok(())
}

async fn run_chat(config: &Config, thread: Option<String>) -> Result<(), Box<dyn Error>> {
    let (mut session, mut events) = ChatSession::new(config);
    if !session.is_available() {
        return Err(offline_error().into());
    }

    session.switch_thread(thread).await;
    for message in session.messages() {
        print_history_entry(message);
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    print_prompt()?;

    loop {
        tokio::select! {
            received = events.recv() => {
                let Some((event, stream_id)) = received else { break; };
                match session.apply(event, stream_id) {
                    SessionUpdate::Chunk(text) => {
                        print!("{text}");
                        io::stdout().flush()?;
                    }
                    SessionUpdate::Completed { new_thread_id } => {
                        println!();
                        if let Some(id) = new_thread_id {
                            println!("(thread {id})");
                        }
                        print_turn_state(&session);
                        print_prompt()?;
                    }
                    SessionUpdate::Failed(message) => {
                        println!();
                        eprintln!("error: {message}");
                        print_prompt()?;
                    }
                    SessionUpdate::Ignored => {}
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break; };
                let input = line.trim();
                match input {
                    "" => print_prompt()?,
                    "/quit" | "/exit" => break,
                    "/stop" => {
                        session.stop();
                        println!("(stopped)");
                        print_prompt()?;
                    }
                    text => {
                        if session.send(text).is_none() {
                            print_prompt()?;
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn offline_error() -> ClientError {
    eprintln!("hint: set BROOK_DEPLOYMENT_URL and BROOK_ACCESS_TOKEN, or fill in config.toml");
    ClientError::Unavailable
}

fn print_prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

fn print_history_entry(message: &Message) {
    let text = extract_text(&message.content);
    match message.kind {
        MessageKind::Human => println!("> {text}"),
        MessageKind::Ai if !text.is_empty() => println!("{text}\n"),
        MessageKind::Tool if !text.is_empty() => println!("🔧 {text}\n"),
        _ => {}
    }
}

fn print_turn_state(session: &ChatSession) {
    if !session.todos().is_empty() {
        println!("Todos:");
        for todo in session.todos() {
            let marker = match todo.status {
                TodoStatus::Pending => " ",
                TodoStatus::InProgress => "~",
                TodoStatus::Completed => "x",
            };
            println!("  [{marker}] {}", todo.content);
        }
    }
    if !session.files().is_empty() {
        let names: Vec<&str> = session.files().keys().map(String::as_str).collect();
        println!("Files: {}", names.join(", "));
    }
}
