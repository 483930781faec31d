//! `garden` - Prompt Refinement Garden
//!
//! This binary drives a refinement session from the terminal: import test
//! cases, train a prompt interactively, synthesize a template and validate
//! it against held-out cases. Session state lives in a JSON snapshot between
//! invocations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use dialoguer::Confirm;
use garden_core::config::{default_session_path, log_path, Config};
use garden_core::output::OutputFormatter;
use garden_core::persistence::{self, save_jsonl, save_snapshot, SessionSnapshot};
use garden_core::{
    logger, ChatClient, CompletionProvider, GardenError, ImportFormat, Session, SessionContext,
    TestCase,
};

use crate::cli::{CasesCommand, Cli, Commands};

mod cli;

/// Main entry point for the garden CLI
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let formatter = OutputFormatter::new();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            config.apply_env_overrides_from(|key| std::env::var(key).ok());
            config
        }
        None => Config::load_or_default(),
    };

    if let Some(path) = log_path(&config) {
        logger::init(path, config.logging.ring_size);
    }

    // Commands that do not need a session
    match &cli.command {
        Commands::Config { cmd } => {
            return cli::config::handle_config(
                cmd.clone(),
                &mut config,
                cli.config.as_deref(),
                &formatter,
            );
        }
        Commands::Logs { lines } => return print_log_tail(&config, *lines),
        _ => {}
    }

    let session_path = match &cli.session {
        Some(path) => path.clone(),
        None => default_session_path().context("Could not determine a data directory")?,
    };

    if let Commands::Reset { yes } = &cli.command {
        return reset_session(&session_path, *yes).await;
    }

    let provider: Arc<dyn CompletionProvider> = Arc::new(ChatClient::from_config(&config.provider));
    let context = SessionContext::from_config(&config);
    let snapshot = persistence::load_or_empty(&session_path)
        .await
        .with_context(|| format!("Failed to load session from {}", session_path.display()))?;
    let mut session = Session::from_snapshot(provider, context, &config, snapshot)?;

    let outcome = run_command(cli.command, &mut session, &formatter, &session_path).await;

    // prior state is intact after a failed operation, so always persist
    save_snapshot(&session_path, &session.snapshot())
        .await
        .with_context(|| format!("Failed to save session to {}", session_path.display()))?;

    if let Err(e) = outcome {
        print_error(&e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_command(
    command: Commands,
    session: &mut Session,
    formatter: &OutputFormatter,
    session_path: &Path,
) -> Result<()> {
    match command {
        Commands::Import {
            file,
            training,
            format,
        } => {
            let format = format
                .map(|f| f.parse::<ImportFormat>())
                .transpose()?;
            let split = session.import_file(&file, format, training).await?;
            formatter.print_split(&split);
        }

        Commands::Train => {
            cli::train::handle_train(session, formatter, session_path).await?;
        }

        Commands::Run => match session.run_active().await? {
            Some(output) => {
                formatter.print_output(&output);
                println!("Rate it with `garden feedback <text> --score <1-5>`.");
            }
            None => println!(
                "Nothing to run: the active case already has an output ({} training cases).",
                session.training_cases().len()
            ),
        },

        Commands::Feedback { text, score } => {
            let outcome = session.submit_feedback(&text, score).await?;
            formatter.print_feedback_outcome(&outcome);
        }

        Commands::Regenerate => {
            let template = session.regenerate_template().await?;
            formatter.print_template(Some(template));
        }

        Commands::Template { copy } => {
            formatter.print_template(session.template());
            if copy {
                let text = session
                    .template()
                    .map(|t| t.text.clone())
                    .context("There is no template to copy yet")?;
                let mut clipboard = arboard::Clipboard::new().context("Clipboard unavailable")?;
                clipboard
                    .set_text(text)
                    .context("Failed to copy to clipboard")?;
                println!("{}", Style::new().green().apply_to("Copied to clipboard."));
            }
        }

        Commands::Validate {
            concurrency,
            output,
        } => {
            if let Some(concurrency) = concurrency {
                session.set_max_concurrency(concurrency);
            }
            let report = session.run_validation().await?;
            formatter.print_report(&report);
            if let Some(path) = output {
                save_jsonl(&path, &report.results)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Results written to {}", path.display());
            }
        }

        Commands::Cases { cmd } => match cmd.unwrap_or(CasesCommand::List) {
            CasesCommand::List => formatter.print_cases(session),
            CasesCommand::AddTraining => {
                let index = session.add_training_case()?;
                println!("Added training case {} (now active).", index + 1);
            }
            CasesCommand::Select { index } => {
                session.select_training_case(one_based(index)?)?;
                formatter.print_cases(session);
            }
            CasesCommand::AddTest { prompt, expected } => {
                let index = session.add_testing_case(TestCase::new(prompt, expected))?;
                println!("Added testing case {}.", index + 1);
            }
            CasesCommand::RemoveTest { index } => {
                let removed = session.remove_testing_case(one_based(index)?)?;
                println!("Removed testing case: {}", removed.user_prompt);
            }
        },

        Commands::Config { .. } | Commands::Logs { .. } | Commands::Reset { .. } => {}
    }

    Ok(())
}

fn one_based(index: usize) -> Result<usize> {
    index
        .checked_sub(1)
        .context("Case numbers start at 1")
}

async fn reset_session(session_path: &Path, yes: bool) -> Result<()> {
    let confirmed = yes
        || Confirm::new()
            .with_prompt("Discard all cases, iterations and the current template?")
            .default(false)
            .interact()?;
    if !confirmed {
        println!("Kept the current session.");
        return Ok(());
    }
    save_snapshot(session_path, &SessionSnapshot::empty()).await?;
    println!("Started a new session.");
    Ok(())
}

fn print_log_tail(config: &Config, lines: usize) -> Result<()> {
    let Some(path) = log_path(config) else {
        println!("No log location configured.");
        return Ok(());
    };
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("No log file at {} yet.", path.display());
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let all: Vec<&str> = content.lines().collect();
    for line in &all[all.len().saturating_sub(lines)..] {
        println!("{}", line);
    }
    Ok(())
}

/// Show library errors with their user-facing text
pub(crate) fn print_error(error: &anyhow::Error) {
    let red = Style::new().red().bold();
    let Some(garden) = error.downcast_ref::<GardenError>() else {
        eprintln!("{} {:#}", red.apply_to("Error:"), error);
        return;
    };

    let heading = if garden.requires_user_action() {
        Style::new().yellow().bold().apply_to("Action needed:")
    } else {
        red.apply_to("Error:")
    };
    eprintln!("{} {}", heading, garden.user_message());
    if garden.is_retryable() {
        eprintln!("{}", Style::new().dim().apply_to("This looks temporary; try again."));
    }
}
