//! Command-line interface

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::agent::{Agent, AgentEvent, AgentOptions, OpenAiCompatibleModel};
use crate::auth::{Credential, CredentialProvider, InstalledFlowProvider};
use crate::client::{MailProvider, ProductionGmailClient};
use crate::config::{Config, Verbosity};
use crate::error::{Result, TriageError};
use crate::models::{AgentResponse, DeleteReport, OutcomeStatus};
use crate::tools::ToolRegistry;

#[derive(Parser, Debug)]
#[command(name = "gmail-triage")]
#[command(version = "0.1.0")]
#[command(about = "Conversational Gmail inbox triage assistant", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 client secrets file (overrides config)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Path to token cache file (overrides config)
    #[arg(long)]
    pub token_cache: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Debug logging (implies verbose)
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Chat with the assistant about your inbox
    Chat {
        /// Conversation thread ID to keep context across turns
        #[arg(long)]
        thread: Option<String>,

        /// Only simulate deletions
        #[arg(long)]
        dry_run: bool,
    },

    /// Let the assistant skim the inbox and delete unwanted emails
    Clean {
        /// Number of emails to delete
        #[arg(long, default_value_t = 100)]
        max_results: usize,

        /// Only simulate deletions
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete messages directly by id or query, without the assistant
    Delete {
        /// Message ids to delete
        ids: Vec<String>,

        /// Gmail search query selecting messages to delete
        #[arg(short, long)]
        query: Option<String>,

        /// Maximum messages a query may delete
        #[arg(long)]
        max_results: Option<usize>,

        /// Only simulate deletions
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Apply global flags on top of file and environment settings
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(path) = &self.credentials {
            config.gmail.client_secrets_file = path.clone();
        }
        if let Some(path) = &self.token_cache {
            config.gmail.token_file = path.clone();
        }
        if self.debug {
            config.verbosity = Verbosity::Debug;
        } else if self.verbose && config.verbosity == Verbosity::Normal {
            config.verbosity = Verbosity::Verbose;
        }
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len.saturating_sub(3)).collect::<String>())
    }
}

/// Spinners shown while waiting on Gmail or the model
pub struct ProgressReporter {
    spinner_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let spinner_style = ProgressStyle::with_template("{spinner:.green} [{elapsed:>4}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        Self { spinner_style }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        println!("  ✓ {}", msg);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

pub fn clean_prompt(count: usize) -> String {
    format!(
        "Delete {} emails by skimming all the emails and list their subject lines.",
        count
    )
}

pub fn format_agent_response(response: &AgentResponse) -> String {
    let mut text = format!("Agent: {}", response.message);

    if let Some(subjects) = response.deleted_subjects.as_ref().filter(|s| !s.is_empty()) {
        text.push_str(&format!("\nDeleted ({}):", subjects.len()));
        for subject in subjects {
            text.push_str(&format!("\n  - {}", truncate_string(subject, 80)));
        }
    }

    if !response.success {
        text.push_str(&format!(
            "\nTool Error: {}",
            response.error_type.as_deref().unwrap_or("Unknown")
        ));
        if let Some(detail) = &response.error_message {
            text.push_str(&format!("\n   Detail: {}", detail));
        }
    }

    text
}

pub fn format_delete_report(report: &DeleteReport) -> String {
    if report.is_empty() {
        return "No messages matched query.".to_string();
    }

    let mut lines = vec![
        "========================================".to_string(),
        if report.dry_run {
            "Delete Summary (DRY RUN)".to_string()
        } else {
            "Delete Summary".to_string()
        },
        "========================================".to_string(),
        format!("Attempted: {}", report.total_attempted),
        format!("Deleted:   {}", report.deleted_count),
        format!("Simulated: {}", report.simulated_count),
        format!("Errors:    {}", report.error_count()),
    ];

    for outcome in &report.outcomes {
        let status = match outcome.status {
            OutcomeStatus::Deleted => "deleted",
            OutcomeStatus::Simulated => "would delete",
            OutcomeStatus::Error => "FAILED",
        };
        match &outcome.error_detail {
            Some(detail) => lines.push(format!("  {} {}: {}", status, outcome.id, detail)),
            None => lines.push(format!("  {} {}", status, outcome.id)),
        }
    }
    lines.push("========================================".to_string());

    lines.join("\n")
}

/// One line per intermediate step of a batch run
pub fn format_event(event: &AgentEvent) -> String {
    match event {
        AgentEvent::ModelText(text) => format!("[model] {}", truncate_string(text, 200)),
        AgentEvent::ToolCall { name, arguments } => {
            format!("[call] {} {}", name, truncate_string(&arguments.to_string(), 200))
        }
        AgentEvent::ToolResult {
            name,
            output,
            is_error,
        } => format!(
            "[{}] {} {}",
            if *is_error { "error" } else { "result" },
            name,
            truncate_string(output, 200)
        ),
        AgentEvent::Summarized => "[memory] summarized earlier conversation".to_string(),
    }
}

/// What one REPL read produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplRead {
    Line(String),
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplInput<'a> {
    Skip,
    Exit,
    Message(&'a str),
}

fn classify_input(line: &str) -> ReplInput<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        ReplInput::Skip
    } else if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        ReplInput::Exit
    } else {
        ReplInput::Message(trimmed)
    }
}

/// Prompt for one line with `inquire`
pub fn read_line_interactive() -> Result<ReplRead> {
    match inquire::Text::new("You:").prompt() {
        Ok(line) => Ok(ReplRead::Line(line)),
        Err(inquire::InquireError::OperationInterrupted) => Ok(ReplRead::Interrupted),
        Err(inquire::InquireError::OperationCanceled) => Ok(ReplRead::Line(String::new())),
        Err(e) => Err(TriageError::IoError(std::io::Error::other(e.to_string()))),
    }
}

/// Interactive conversation loop on one thread
pub async fn run_repl<R>(
    agent: &mut Agent,
    thread_id: &str,
    mut read_line: R,
    out: &mut dyn Write,
) -> Result<()>
where
    R: FnMut() -> Result<ReplRead>,
{
    writeln!(out, "\nGmail triage assistant is live!")?;
    writeln!(out, "Chat naturally about your inbox. Examples:")?;
    writeln!(out, "   - 'Show me unread promotional emails'")?;
    writeln!(out, "   - 'Delete emails older than 30 days'")?;
    writeln!(out, "Type 'exit' or 'quit' to end the session.\n")?;

    loop {
        let line = match read_line()? {
            ReplRead::Line(line) => line,
            ReplRead::Interrupted => {
                writeln!(out, "\nInterrupted by user. Exiting session.")?;
                return Ok(());
            }
        };

        let input = match classify_input(&line) {
            ReplInput::Skip => continue,
            ReplInput::Exit => {
                writeln!(out, "Exiting session. Goodbye!")?;
                return Ok(());
            }
            ReplInput::Message(input) => input,
        };

        match agent.run_turn(thread_id, input).await {
            Ok(response) => writeln!(out, "\n{}\n", format_agent_response(&response))?,
            Err(e) => writeln!(out, "Error: {}\n", e)?,
        }
    }
}

/// One-shot batch clean, printing each intermediate step
pub async fn run_clean(
    agent: &mut Agent,
    thread_id: &str,
    count: usize,
    out: &mut dyn Write,
) -> Result<AgentResponse> {
    let prompt = clean_prompt(count);
    info!("Starting batch clean: {}", prompt);

    // Events are written as they happen; a failed turn keeps what was printed
    let mut write_error: Option<std::io::Error> = None;
    let result = agent
        .run_turn_with(thread_id, &prompt, &mut |event| {
            if write_error.is_none() {
                if let Err(e) = writeln!(out, "{}", format_event(event)).and_then(|_| out.flush()) {
                    write_error = Some(e);
                }
            }
        })
        .await;

    if let Some(e) = write_error {
        return Err(e.into());
    }
    let response = result?;
    writeln!(out, "\n{}", format_agent_response(&response))?;
    Ok(response)
}

/// Run the credential bootstrap, discarding any cached token first when `force` is set
pub async fn run_auth(
    provider: &dyn CredentialProvider,
    force: bool,
    out: &mut dyn Write,
) -> Result<Credential> {
    let token_path = provider.token_path();
    if force && token_path.exists() {
        tokio::fs::remove_file(token_path).await?;
        info!("Removed existing token cache");
    }

    let credential = provider.ensure_token().await?;

    writeln!(out, "Successfully authenticated with Gmail API")?;
    writeln!(out, "Token cached at: {:?}", token_path)?;
    writeln!(out, "Scopes: {}", credential.scopes.join(", "))?;
    Ok(credential)
}

/// Authenticate and wrap the resulting hub in a mail provider
pub async fn connect_gmail(config: &Config) -> Result<Arc<dyn MailProvider>> {
    let credentials = InstalledFlowProvider::new(
        &config.gmail.client_secrets_file,
        &config.gmail.token_file,
    );
    let hub = credentials.hub().await?;
    Ok(Arc::new(ProductionGmailClient::new(hub)))
}

/// Assemble the agent: Gmail tools over `provider`, model from the agent config
pub fn build_agent(config: &Config, provider: Arc<dyn MailProvider>) -> Result<Agent> {
    let model = OpenAiCompatibleModel::from_config(&config.agent)?;
    let tools = ToolRegistry::gmail(
        provider,
        config.delete.to_delete_config(),
        config.delete.default_max_results,
    );
    Ok(Agent::new(
        Arc::new(model),
        tools,
        AgentOptions::from(&config.agent),
    ))
}
