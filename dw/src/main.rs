//! Draftwise - interview-driven content authoring
//!
//! CLI entry point for the console, the command server and its client.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use eyre::{Context, Result, eyre};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info, warn};

use draftwise::cli::{Cli, Command, environment_summary, get_log_path};
use draftwise::collab::Controller;
use draftwise::config::Config;
use draftwise::llm::Generator;
use draftwise::repl;
use draftwise::server::{self, CommandClient, Dispatcher, Request};
use draftwise::session::SessionRegistry;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command();
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "Draftwise loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Chat { locale, autopilot }) => repl::run_interactive(&config, locale, autopilot).await,
        Some(Command::Serve { socket }) => cmd_serve(&config, socket).await,
        Some(Command::Send {
            kind,
            session,
            data,
            socket,
        }) => cmd_send(&config, kind, session, data, socket).await,
        Some(Command::Outline {
            topic,
            content_type,
            words,
        }) => cmd_outline(&config, &topic, &content_type, words).await,
        None => {
            debug!("main: no command specified, printing help");
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
            println!("{}", environment_summary(cli.config.as_ref()));
            Ok(())
        }
    }
}

fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let generator = Generator::from_config(&config.llm).context("Failed to create LLM client")?;
    let controller = Controller::from_config(config, generator);
    let registry = SessionRegistry::new(controller.policy().max_probes);
    Ok(Dispatcher::new(Arc::new(controller), Arc::new(registry)))
}

/// Run the command server until SIGINT or SIGTERM
async fn cmd_serve(config: &Config, socket: Option<PathBuf>) -> Result<()> {
    debug!(?socket, "cmd_serve: called");
    config.validate()?;

    let dispatcher = Arc::new(build_dispatcher(config)?);
    let socket_path = socket.unwrap_or_else(|| config.server.socket_path());
    let (listener, socket_path) = server::listener::create_listener_at(&socket_path)?;
    println!("Draftwise server listening on {}", socket_path.display());
    info!(socket = %socket_path.display(), "cmd_serve: listening");

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
        }
    };

    let result = server::listener::serve(listener, dispatcher, shutdown).await;
    server::listener::cleanup_socket(&socket_path);
    info!("cmd_serve: shutdown complete");
    result
}

/// Send one request to a running server
async fn cmd_send(
    config: &Config,
    kind: String,
    session: Option<String>,
    data: Option<String>,
    socket: Option<PathBuf>,
) -> Result<()> {
    debug!(%kind, ?session, "cmd_send: called");
    let socket_path = socket.unwrap_or_else(|| config.server.socket_path());
    let client = CommandClient::with_socket_path(socket_path);
    if !client.socket_exists() {
        return Err(eyre!("No server socket found. Start one with `dw serve`."));
    }

    let mut request = Request::new(kind);
    if let Some(session) = session {
        request = request.with_session(session);
    }
    if let Some(data) = data {
        let value: serde_json::Value = serde_json::from_str(&data).context("--data must be valid JSON")?;
        request = request.with_data(value);
    }

    let response = client.send(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Generate an outline in-process and print the response envelope
async fn cmd_outline(config: &Config, topic: &str, content_type: &str, words: u32) -> Result<()> {
    debug!(%topic, %content_type, %words, "cmd_outline: called");
    let dispatcher = build_dispatcher(config)?;
    let request = Request::new("GENERATE_OUTLINE").with_data(serde_json::json!({
        "topic": topic,
        "articleType": content_type,
        "wordCount": words,
    }));

    let response = dispatcher.dispatch(request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
