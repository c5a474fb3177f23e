//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::debug;

use crate::collab::Locale;
use crate::config::Config;
use crate::prompts::DEFAULT_TARGET_LENGTH;

/// Draftwise - interview-driven content authoring
#[derive(Parser)]
#[command(
    name = "dw",
    about = "Interview-driven content authoring assistant",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interactive authoring session
    Chat {
        /// Language of the assistant's messages
        #[arg(long, value_enum)]
        locale: Option<Locale>,

        /// Let the model answer interview questions
        #[arg(long)]
        autopilot: bool,
    },

    /// Run the command server on a Unix socket
    Serve {
        /// Socket path (overrides server.socket-path)
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Send one command to a running server and print the response
    Send {
        /// Command type, e.g. PROCESS_INPUT
        #[arg(value_name = "TYPE")]
        kind: String,

        /// Session id
        #[arg(long)]
        session: Option<String>,

        /// Command payload as JSON
        #[arg(short, long)]
        data: Option<String>,

        /// Socket path (overrides server.socket-path)
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Generate an outline and print it as JSON
    Outline {
        /// Topic of the piece
        #[arg(short, long)]
        topic: String,

        /// Content type (Article, Blog Post, Report, ...)
        #[arg(long = "type", default_value = "Article")]
        content_type: String,

        /// Target length in words
        #[arg(short, long, default_value_t = DEFAULT_TARGET_LENGTH)]
        words: u32,
    },
}

/// Log file location
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("draftwise")
        .join("logs")
        .join("draftwise.log")
}

/// Environment summary shown after the help text
pub fn environment_summary(config_path: Option<&PathBuf>) -> String {
    debug!(?config_path, "environment_summary: called");
    let config = Config::load(config_path).unwrap_or_default();
    let key_env = &config.llm.api_key_env;
    let key_status = if std::env::var(key_env).is_ok() {
        "set".green()
    } else {
        "missing".red()
    };
    let config_source = match Config::locate(config_path) {
        Some(path) => path.display().to_string(),
        None => "defaults".to_string(),
    };

    let mut lines = Vec::new();
    lines.push("Environment:".bold().to_string());
    lines.push(format!("  {:14} {} ({})", "API key", key_env, key_status));
    lines.push(format!("  {:14} {} / {}", "Model", config.llm.provider, config.llm.model));
    lines.push(format!("  {:14} {}", "Config", config_source));
    lines.push(format!("  {:14} {}", "Socket", config.server.socket_path().display()));
    lines.push(format!("  {:14} {}", "Log", get_log_path().display()));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["dw"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_parse_chat() {
        let cli = Cli::parse_from(["dw", "chat", "--locale", "zh", "--autopilot"]);
        assert!(matches!(
            cli.command,
            Some(Command::Chat {
                locale: Some(Locale::Zh),
                autopilot: true
            })
        ));
    }

    #[test]
    fn test_cli_parse_send() {
        let cli = Cli::parse_from([
            "dw",
            "send",
            "PROCESS_INPUT",
            "--session",
            "abc",
            "--data",
            r#"{"input":"hi"}"#,
        ]);
        if let Some(Command::Send {
            kind, session, data, ..
        }) = cli.command
        {
            assert_eq!(kind, "PROCESS_INPUT");
            assert_eq!(session.as_deref(), Some("abc"));
            assert_eq!(data.as_deref(), Some(r#"{"input":"hi"}"#));
        } else {
            panic!("Expected Send command");
        }
    }

    #[test]
    fn test_cli_parse_outline_defaults() {
        let cli = Cli::parse_from(["dw", "outline", "--topic", "Solar power"]);
        if let Some(Command::Outline {
            topic,
            content_type,
            words,
        }) = cli.command
        {
            assert_eq!(topic, "Solar power");
            assert_eq!(content_type, "Article");
            assert_eq!(words, DEFAULT_TARGET_LENGTH);
        } else {
            panic!("Expected Outline command");
        }
    }

    #[test]
    fn test_cli_with_config_and_log_level() {
        let cli = Cli::parse_from(["dw", "-c", "/path/to/config.yml", "-l", "debug", "serve"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Some(Command::Serve { socket: None })));
    }

    #[test]
    fn test_log_path() {
        assert!(get_log_path().ends_with("draftwise/logs/draftwise.log"));
    }
}
