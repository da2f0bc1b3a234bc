use anyhow::Result;
use clap::Parser;
use gmail_triage::auth::InstalledFlowProvider;
use gmail_triage::cli::{self, Cli, Commands, ProgressReporter};
use gmail_triage::config::{Config, ENV_API_KEY};
use gmail_triage::delete::DeleteOperation;
use gmail_triage::error::{DeleteError, TriageError};
use gmail_triage::models::DeleteRequest;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        display_error(&e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Install default crypto provider for rustls
    // On non-Windows platforms, use aws-lc-rs; on Windows, use ring
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    // A missing .env file is fine
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config).await?;
    config.apply_env(|name| std::env::var(name).ok());
    cli.apply_overrides(&mut config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.filter_directives()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!("Gmail triage starting with {:?} verbosity", config.verbosity);

    let mut stdout = std::io::stdout();

    match cli.command {
        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");
            let provider = InstalledFlowProvider::new(
                &config.gmail.client_secrets_file,
                &config.gmail.token_file,
            );
            cli::run_auth(&provider, force, &mut stdout).await?;
            Ok(())
        }

        Commands::Chat { thread, dry_run } => {
            require_api_key(&config)?;
            if dry_run {
                config.delete.dry_run = true;
            }
            if config.delete.dry_run {
                println!("Running in DRY RUN mode - no emails will be deleted");
            }

            let reporter = ProgressReporter::new();
            let spinner = reporter.add_spinner("Authenticating with Gmail API...");
            let provider = cli::connect_gmail(&config).await?;
            reporter.finish_spinner(&spinner, "Gmail API authenticated");

            let thread_id = thread.unwrap_or_else(|| config.agent.thread_id.clone());
            let mut agent = cli::build_agent(&config, provider)?;

            cli::run_repl(&mut agent, &thread_id, cli::read_line_interactive, &mut stdout).await?;
            Ok(())
        }

        Commands::Clean {
            max_results,
            dry_run,
        } => {
            require_api_key(&config)?;
            if dry_run {
                config.delete.dry_run = true;
            }
            if config.delete.dry_run {
                println!("Running in DRY RUN mode - no emails will be deleted");
            }

            let reporter = ProgressReporter::new();
            let spinner = reporter.add_spinner("Authenticating with Gmail API...");
            let provider = cli::connect_gmail(&config).await?;
            reporter.finish_spinner(&spinner, "Gmail API authenticated");

            let mut agent = cli::build_agent(&config, provider)?;
            let response =
                cli::run_clean(&mut agent, &config.agent.thread_id, max_results, &mut stdout)
                    .await?;

            if !response.success {
                process::exit(1);
            }
            Ok(())
        }

        Commands::Delete {
            ids,
            query,
            max_results,
            dry_run,
        } => {
            let request = DeleteRequest {
                message_ids: ids,
                query,
                simulate: dry_run,
                limit: max_results.unwrap_or(config.delete.default_max_results),
            };

            let reporter = ProgressReporter::new();
            let spinner = reporter.add_spinner("Authenticating with Gmail API...");
            let provider = cli::connect_gmail(&config).await?;
            reporter.finish_spinner(&spinner, "Gmail API authenticated");

            let operation = DeleteOperation::new(provider, config.delete.to_delete_config());
            let spinner = reporter.add_spinner("Deleting messages...");
            let result = operation.execute(&request).await;
            spinner.finish_and_clear();

            let report = result?;
            println!("{}", cli::format_delete_report(&report));
            if report.dry_run {
                println!("Dry run complete. No emails were deleted.");
            }
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !force {
                return Err(TriageError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(&output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nKey settings to review:");
            println!("  - gmail.client_secrets_file: OAuth client JSON from Google Cloud Console");
            println!("  - delete.dry_run: simulate every deletion");
            println!("  - delete.throttle_ms: pause between delete calls");
            println!("  - agent.model: chat model used by the assistant");
            Ok(())
        }
    }
}

fn require_api_key(config: &Config) -> Result<()> {
    if config.agent.api_key.is_none() {
        return Err(TriageError::ConfigError(format!(
            "Missing {} environment variable",
            ENV_API_KEY
        ))
        .into());
    }
    Ok(())
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    let triage_err = error.downcast_ref::<TriageError>().or_else(|| {
        error
            .downcast_ref::<DeleteError>()
            .and_then(|e| match e {
                DeleteError::Resolution(inner) => Some(inner),
                DeleteError::Validation(_) => None,
            })
    });

    if let Some(TriageError::MissingClientSecrets(path)) = triage_err {
        eprintln!(
            "Missing client secrets JSON at {}. Download from Google Cloud Console (OAuth client ID).",
            path.display()
        );
        return;
    }

    eprintln!("Error: {}", error);

    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    if let Some(DeleteError::Validation(_)) = error.downcast_ref::<DeleteError>() {
        eprintln!("\nHint: Give message ids or --query, for example:");
        eprintln!("      gmail-triage delete --query 'category:promotions older_than:30d' --dry-run");
        return;
    }

    match triage_err {
        Some(TriageError::AuthError(_)) => {
            eprintln!("\nHint: Make sure your client secrets file is valid.");
            eprintln!("      Try running: gmail-triage auth --force");
        }
        Some(TriageError::RateLimitExceeded { .. }) => {
            eprintln!("\nHint: You've hit Gmail API rate limits.");
            eprintln!("      Wait a few seconds and try again, or raise delete.throttle_ms.");
        }
        Some(TriageError::ConfigError(msg)) if msg.contains(ENV_API_KEY) => {
            eprintln!("\nHint: Set {} in your environment or in a .env file.", ENV_API_KEY);
        }
        Some(TriageError::ConfigError(_)) => {
            eprintln!("\nHint: Check your configuration file for errors.");
            eprintln!("      Run: gmail-triage init-config --force");
        }
        Some(TriageError::LlmError(_)) => {
            eprintln!("\nHint: Check agent.api_base, agent.model and your API key.");
        }
        _ => {}
    }
}
