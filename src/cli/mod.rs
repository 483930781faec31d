//! CLI argument parsing using clap 4.x derive macros

pub mod config;
pub mod train;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Prompt Refinement Garden
///
/// Refine a prompt from human feedback, synthesize a reusable template from
/// the feedback history, and validate it against held-out test cases.
#[derive(Parser, Debug)]
#[command(name = "garden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of the standard locations
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Session file (defaults to the data directory)
    #[arg(short, long, global = true)]
    pub session: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import test cases from a CSV, spreadsheet or JSON file
    Import {
        /// File to import
        file: PathBuf,

        /// Number of leading cases used for training (the rest are for testing)
        #[arg(short, long)]
        training: Option<usize>,

        /// Override the format inferred from the extension (csv, xlsx, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Interactive training loop: run, give feedback, repeat
    Train,

    /// Run the active training case if it has no output yet
    Run,

    /// Rate the output waiting for feedback (from `run` or an earlier `train`)
    Feedback {
        /// What should change in the output
        text: String,

        /// Quality score; 5 accepts the prompt as the template
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=5))]
        score: i64,
    },

    /// Re-synthesize the optimized template from the feedback history
    Regenerate,

    /// Show the optimized template
    Template {
        /// Copy the template to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// Validate the optimized template against the testing cases
    Validate {
        /// Concurrent provider requests (overrides the config)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Write per-case results as JSON lines
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List or edit training and testing cases
    Cases {
        #[command(subcommand)]
        cmd: Option<CasesCommand>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        cmd: Option<ConfigCommand>,
    },

    /// Show the most recent debug log lines
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },

    /// Discard the current session and start over
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum CasesCommand {
    /// List training and testing cases
    List,
    /// Add an empty training case and make it active
    AddTraining,
    /// Make a training case active (1-based)
    Select { index: usize },
    /// Add a held-out testing case
    AddTest { prompt: String, expected: String },
    /// Remove a testing case (1-based)
    RemoveTest { index: usize },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Store the provider API key in the config file
    SetKey,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
