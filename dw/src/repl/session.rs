//! Console session loop

use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use eyre::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info, warn};

use super::{EMPTY_INPUT, FAREWELL, LineAction, classify};
use crate::collab::{Controller, Reply};
use crate::llm::Role;
use crate::session::{Phase, SessionState};

/// One console conversation over an in-process session
pub struct ChatSession {
    controller: Arc<Controller>,
    state: SessionState,
    autopilot: bool,
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Quit,
}

impl ChatSession {
    pub fn new(controller: Arc<Controller>, autopilot: bool) -> Self {
        let state = Self::fresh_state(&controller);
        Self {
            controller,
            state,
            autopilot,
        }
    }

    fn fresh_state(controller: &Controller) -> SessionState {
        SessionState::new(uuid::Uuid::now_v7().to_string()).with_max_probes(controller.policy().max_probes)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn autopilot(&self) -> bool {
        self.autopilot
    }

    /// Run the main loop until quit, Ctrl-D or a terminating reply
    pub async fn run(&mut self) -> Result<()> {
        info!(session = %self.state.id, autopilot = self.autopilot, "ChatSession::run: starting");
        self.print_banner();
        if let Some(reply) = self.controller.greet(&mut self.state) {
            self.print_reply(&reply);
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));
            match readline {
                Ok(line) => {
                    match classify(&line, self.state.phase()) {
                        LineAction::Empty => {
                            println!("{}", EMPTY_INPUT.yellow());
                            continue;
                        }
                        LineAction::Slash(cmd, arg) => {
                            let _ = rl.add_history_entry(line.trim());
                            match self.handle_slash_command(cmd, arg).await {
                                SlashResult::Continue => continue,
                                SlashResult::Quit => break,
                            }
                        }
                        LineAction::Quit => break,
                        LineAction::Forward(input) => {
                            let _ = rl.add_history_entry(input);
                            if self.process_input(input).await {
                                break;
                            }
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - just show new prompt
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("{}", FAREWELL.bright_cyan());
        info!(session = %self.state.id, phase = ?self.state.phase(), "ChatSession::run: finished");
        Ok(())
    }

    /// Hand one input to the controller; true when the console should close
    pub async fn process_input(&mut self, input: &str) -> bool {
        debug!(phase = ?self.state.phase(), "process_input: called");
        let reply = self.controller.handle(&mut self.state, input).await;
        self.print_reply(&reply);
        if reply.terminate {
            return true;
        }
        if self.autopilot {
            return self.run_autopilot().await;
        }
        false
    }

    /// Let the model answer pending interview questions until it stops
    async fn run_autopilot(&mut self) -> bool {
        loop {
            match self.controller.autopilot_step(&mut self.state).await {
                Ok(Some(turn)) => {
                    println!("{} {}", "[autopilot]".magenta(), turn.answer.dimmed());
                    self.print_reply(&turn.reply);
                    if turn.reply.terminate {
                        return true;
                    }
                }
                Ok(None) => return false,
                Err(e) => {
                    warn!(error = %e, "run_autopilot: step failed");
                    println!("{} {}", "Autopilot paused:".yellow(), e);
                    return false;
                }
            }
        }
    }

    fn print_banner(&self) {
        println!();
        println!("{}", "Draftwise Content Collaboration".bright_cyan().bold());
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        if self.autopilot {
            println!("{}", "Autopilot is on: interview questions are answered by the model.".dimmed());
        }
        println!();
    }

    fn print_reply(&self, reply: &Reply) {
        println!();
        println!("{}", reply.message);
        println!();
        debug!(phase = ?reply.phase, terminate = reply.terminate, "print_reply: printed");
    }

    async fn handle_slash_command(&mut self, cmd: &str, arg: Option<&str>) -> SlashResult {
        debug!(%cmd, ?arg, "handle_slash_command: called");
        match cmd {
            "help" | "h" => self.print_help(),
            "quit" | "q" | "exit" => return SlashResult::Quit,
            "status" => self.print_status(),
            "outline" => match &self.state.outline {
                Some(outline) => println!("{}", outline.to_json_pretty()),
                None => println!("{}", "No outline yet.".dimmed()),
            },
            "draft" => match &self.state.draft {
                Some(draft) => println!("{}", draft),
                None => println!("{}", "No draft yet.".dimmed()),
            },
            "save" => match arg {
                Some(path) => match self.save_draft(Path::new(path)) {
                    Ok(true) => println!("{} {}", "Draft saved to".green(), path),
                    Ok(false) => println!("{}", "No draft to save yet.".dimmed()),
                    Err(e) => println!("{} {:#}", "Save failed:".red(), e),
                },
                None => println!("Usage: {}", "/save PATH".yellow()),
            },
            "history" => self.print_history(),
            "autopilot" => {
                self.autopilot = !self.autopilot;
                let label = if self.autopilot { "on" } else { "off" };
                println!("Autopilot {}", label.bright_magenta());
                if self.autopilot && self.run_autopilot().await {
                    return SlashResult::Quit;
                }
            }
            "new" => {
                self.state = Self::fresh_state(&self.controller);
                info!(session = %self.state.id, "handle_slash_command: new session");
                println!("{}", "Started a new session.".dimmed());
                if let Some(reply) = self.controller.greet(&mut self.state) {
                    self.print_reply(&reply);
                }
            }
            _ => {
                println!("{} Unknown command: /{}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        SlashResult::Continue
    }

    /// Write the current draft to `path`; false when there is no draft
    pub fn save_draft(&self, path: &Path) -> Result<bool> {
        let Some(draft) = &self.state.draft else {
            return Ok(false);
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create output directory")?;
        }
        std::fs::write(path, draft).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), bytes = draft.len(), "save_draft: written");
        Ok(true)
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Show the session's phase and details", "/status".yellow());
        println!("  {:14} Show the current outline", "/outline".yellow());
        println!("  {:14} Show the current draft", "/draft".yellow());
        println!("  {:14} Save the draft to a file", "/save PATH".yellow());
        println!("  {:14} Show the conversation so far", "/history".yellow());
        println!("  {:14} Toggle model-answered interview", "/autopilot".yellow());
        println!("  {:14} Start over with a new session", "/new".yellow());
        println!("  {:14} Exit", "/quit".yellow());
        println!();
    }

    fn print_status(&self) {
        let state = &self.state;
        let none = || "-".dimmed().to_string();
        println!();
        println!("{:16} {}", "Session:".bright_cyan(), state.id);
        println!("{:16} {}", "Phase:".bright_cyan(), state.phase());
        println!("{:16} {}", "Content type:".bright_cyan(), state.content_type.clone().unwrap_or_else(none));
        println!("{:16} {}", "Topic:".bright_cyan(), state.topic.clone().unwrap_or_else(none));
        println!(
            "{:16} {}",
            "Target length:".bright_cyan(),
            state.target_length.map(|n| format!("{n} words")).unwrap_or_else(none)
        );
        if state.phase() == Phase::Interview {
            println!(
                "{:16} {}",
                "Section:".bright_cyan(),
                state.current_section.clone().unwrap_or_else(none)
            );
        }
        println!("{:16} {}", "Answers:".bright_cyan(), state.interview_log.len());
        println!("{:16} {}", "Revisions:".bright_cyan(), state.revisions.len());
        println!(
            "{:16} {}",
            "Autopilot:".bright_cyan(),
            if self.autopilot { "on" } else { "off" }
        );
        println!();
    }

    fn print_history(&self) {
        if self.state.transcript.is_empty() {
            println!("{}", "No conversation history.".dimmed());
            return;
        }

        println!();
        println!("{}", "Conversation History:".bright_cyan());
        for entry in &self.state.transcript {
            let role = match entry.role {
                Role::User => "You".bright_green(),
                Role::Assistant => "Assistant".bright_blue(),
            };
            let preview: String = entry.content.chars().take(80).collect();
            let ellipsis = if entry.content.chars().count() > 80 { "..." } else { "" };
            println!(
                "  {} {}: {}{}",
                entry.at.format("%H:%M:%S").to_string().dimmed(),
                role,
                preview.replace('\n', " "),
                ellipsis
            );
        }
        println!();
    }
}
