//! Output formatting module
//!
//! Handles display of case sets, generated outputs, templates and
//! validation reports using colored output.

use console::Style;

use crate::config::Config;
use crate::engine::{FeedbackResult, SynthesisStatus};
use crate::session::{FeedbackOutcome, Session};
use crate::types::{CaseSplit, OptimizedTemplate, TemplateSource, TestCase};
use crate::validation::ValidationReport;

const PREVIEW_CHARS: usize = 60;

/// Output formatter for CLI results
pub struct OutputFormatter {
    // Styles
    blue: Style,
    green: Style,
    yellow: Style,
    red: Style,
    dim: Style,
    bold: Style,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self {
            blue: Style::new().blue(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            dim: Style::new().dim(),
            bold: Style::new().bold(),
        }
    }
}

impl OutputFormatter {
    /// Create a new formatter
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print_split(&self, split: &CaseSplit) {
        println!(
            "{} {} cases for training and {} cases for testing",
            self.green.apply_to("Test cases ready:"),
            split.training.len(),
            split.testing.len()
        );
    }

    /// Print both case sets, marking the active and converged training cases
    pub fn print_cases(&self, session: &Session) {
        println!();
        println!(
            "{}",
            self.bold.apply_to(format!(
                "Training ({} Test Cases)",
                session.training_cases().len()
            ))
        );
        if session.training_cases().is_empty() {
            println!("{}", self.dim.apply_to("  No training cases available yet."));
        }
        for (index, case) in session.training_cases().iter().enumerate() {
            let marker = if index == session.active_case() { ">" } else { " " };
            let status = if session.is_converged(index) {
                self.green.apply_to(" [converged]").to_string()
            } else {
                String::new()
            };
            println!(
                "{} Case {}: {}{}",
                marker,
                index + 1,
                case_label(case),
                status
            );
        }

        println!();
        println!(
            "{}",
            self.bold.apply_to(format!(
                "Testing ({} Test Cases)",
                session.testing_cases().len()
            ))
        );
        for (index, case) in session.testing_cases().iter().enumerate() {
            let score = session
                .results()
                .get(index)
                .map(|r| {
                    let label = format!("{:.2}%", r.similarity_score);
                    format!(" {}", self.score_style(r.similarity_score).apply_to(label))
                })
                .unwrap_or_default();
            println!("  {}. {}{}", index + 1, case_label(case), score);
        }
    }

    pub fn print_output(&self, output: &str) {
        println!();
        println!("{}", self.bold.apply_to("Generated Output:"));
        println!("{}", output);
        println!();
    }

    pub fn print_feedback_outcome(&self, outcome: &FeedbackOutcome) {
        match &outcome.result {
            FeedbackResult::Converged => println!(
                "{}",
                self.green
                    .apply_to("Prompt accepted. It is now the optimized template.")
            ),
            FeedbackResult::Improved { output } => {
                println!("{}", self.blue.apply_to("Improved output based on your feedback:"));
                self.print_output(output);
            }
        }
        match &outcome.synthesis {
            SynthesisStatus::Refreshed => {
                println!("{}", self.blue.apply_to("Optimized template updated."))
            }
            SynthesisStatus::Failed(reason) => println!(
                "{} {}",
                self.yellow
                    .apply_to("Failed to generate optimized prompt; keeping the previous one:"),
                reason
            ),
            SynthesisStatus::Skipped => {}
        }
    }

    pub fn print_template(&self, template: Option<&OptimizedTemplate>) {
        println!();
        println!("{}", self.bold.apply_to("Optimized Prompt Template:"));
        match template {
            Some(template) if !template.is_empty() => {
                let origin = match template.source {
                    TemplateSource::Accepted => "accepted prompt",
                    TemplateSource::Synthesized => "synthesized",
                };
                println!(
                    "{}",
                    self.dim.apply_to(format!(
                        "({}, from {} iterations)",
                        origin, template.iterations
                    ))
                );
                println!("{}", template.text);
            }
            _ => println!(
                "{}",
                self.dim
                    .apply_to("Complete the training phase to generate an optimized prompt.")
            ),
        }
    }

    pub fn print_report(&self, report: &ValidationReport) {
        println!();
        println!("{}", self.bold.apply_to("Test Results:"));
        for (index, result) in report.results.iter().enumerate() {
            println!(
                "{} {}",
                self.bold.apply_to(format!("Case {}:", index + 1)),
                self.score_style(result.similarity_score)
                    .apply_to(format!("{:.2}% similar", result.similarity_score))
            );
            println!("  Input:    {}", preview(&result.input));
            println!("  Expected: {}", preview(&result.expected));
            println!("  Actual:   {}", preview(&result.actual));
        }
        match report.average {
            Some(average) => println!(
                "{} {}",
                self.bold.apply_to("Average Similarity Score:"),
                self.score_style(average).apply_to(format!("{:.1}%", average))
            ),
            None => println!("{}", self.dim.apply_to("No results.")),
        }
    }

    /// Print the effective configuration, never the key itself
    pub fn print_config(&self, config: &Config, has_credential: bool) {
        println!();
        println!("{}", self.bold.apply_to("Current Configuration:"));
        println!("- Base URL: {}", self.green.apply_to(&config.provider.base_url));
        println!("- Model: {}", self.green.apply_to(&config.provider.model));
        println!("- Temperature: {}", config.provider.temperature);
        println!("- Timeout: {}s", config.provider.timeout_secs);
        println!(
            "- API key: {}",
            if has_credential {
                self.green.apply_to("configured".to_string())
            } else {
                self.red
                    .apply_to(format!("missing (set {})", config.provider.api_key_env))
            }
        );
        println!(
            "- Training count: {}",
            config.training.default_training_count
        );
        match config.training.history_window {
            Some(window) => println!("- History window: last {} iterations", window),
            None => println!("- History window: unlimited"),
        }
        println!(
            "- Validation concurrency: {}",
            config.validation.max_concurrency
        );
    }

    fn score_style(&self, score: f64) -> &Style {
        match score_band(score) {
            ScoreBand::High => &self.green,
            ScoreBand::Medium => &self.yellow,
            ScoreBand::Low => &self.red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScoreBand {
    High,
    Medium,
    Low,
}

fn score_band(score: f64) -> ScoreBand {
    if score >= 80.0 {
        ScoreBand::High
    } else if score >= 50.0 {
        ScoreBand::Medium
    } else {
        ScoreBand::Low
    }
}

fn case_label(case: &TestCase) -> String {
    if case.user_prompt.trim().is_empty() {
        "Empty prompt".to_string()
    } else {
        preview(&case.user_prompt)
    }
}

/// Single-line preview, cut at a fixed width
fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        let head: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        flat
    }
}
