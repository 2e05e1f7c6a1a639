//! Command line interface
//!
//! `serve` runs the HTTP API, `ask` answers one question, `chat` runs an
//! interactive session over stdin.

use clap::{Parser, Subcommand};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::app::Application;
use crate::config::AppConfig;
use crate::contracts::SessionId;
use crate::engine::QaChatbot;
use crate::handler::create_router;
use crate::session::SessionRegistry;
use crate::AGENT_VERSION;

#[derive(Parser, Debug)]
#[command(name = "financial-qa")]
#[command(about = "Financial document QA assistant with LangSmith tracing")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(short, long, env = "FINQA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Keep spans in memory and print the span tree on exit
    #[arg(long, global = true)]
    pub local_trace: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Answer a single question and print the exchange as JSON
    Ask {
        #[arg(short, long)]
        question: String,
    },

    /// Interactive chat session
    Chat,
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_toml_file(path)?,
        None => AppConfig::from_env(),
    };
    let app = Application::build(config, cli.local_trace)?;

    match cli.command {
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| app.config().server.host.clone());
            let port = port.unwrap_or(app.config().server.port);
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            let router = create_router(Arc::new(app.into_state()));

            tracing::info!(addr = %addr, version = AGENT_VERSION, "Starting financial QA API");

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }

        Commands::Ask { question } => {
            let result = app.chatbot().ask_question(&question, &[]).await;
            print_local_trace(&app);
            let exchange = result?;
            println!("{}", serde_json::to_string_pretty(&exchange)?);
        }

        Commands::Chat => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            chat_loop(app.chatbot(), stdin, &mut stdout).await?;
            print_local_trace(&app);
        }
    }

    Ok(())
}

fn print_local_trace(app: &Application) {
    if let Some(tree) = app.local_trace() {
        eprintln!("--- span tree ---\n{}", tree);
    }
}

async fn end_session(
    chatbot: &QaChatbot,
    sessions: &SessionRegistry,
    session_id: SessionId,
) -> anyhow::Result<()> {
    let summary = format!(
        "Session with {} interactions",
        sessions.history(session_id).len()
    );
    if sessions.end(session_id, Some(summary.clone()))? {
        chatbot
            .end_conversation_session(session_id, Some(&summary))
            .await;
    }
    Ok(())
}

async fn new_session(chatbot: &QaChatbot, sessions: &SessionRegistry) -> SessionId {
    let session_id = chatbot.start_conversation_session(None).await;
    sessions.open(session_id);
    session_id
}

/// Interactive loop: one question per line.
///
/// `/reset` ends the session and starts a new one, `/quit` (or end of input)
/// ends it and returns. A failed question prints the error and the loop
/// continues. Returns the sessions used, oldest first.
pub async fn chat_loop<R, W>(
    chatbot: &QaChatbot,
    input: R,
    out: &mut W,
) -> anyhow::Result<Vec<SessionId>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let sessions = SessionRegistry::new();
    let mut session_id = new_session(chatbot, &sessions).await;
    let mut used = vec![session_id];

    writeln!(
        out,
        "Financial QA assistant. Type /reset for a new session, /quit to exit."
    )?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                end_session(chatbot, &sessions, session_id).await?;
                session_id = new_session(chatbot, &sessions).await;
                used.push(session_id);
                writeln!(out, "Started a new session.")?;
            }
            question => {
                let history = sessions.history(session_id);
                match chatbot
                    .ask_question_in_session(session_id, question, &history)
                    .await
                {
                    Ok(exchange) => {
                        writeln!(out, "{}", exchange.answer())?;
                        if exchange.document_count() > 0 {
                            writeln!(out, "({} sources)", exchange.document_count())?;
                        }
                        sessions.append(session_id, exchange)?;
                    }
                    Err(e) => writeln!(out, "Error: {}", e)?,
                }
            }
        }
        out.flush()?;
    }

    end_session(chatbot, &sessions, session_id).await?;
    Ok(used)
}
