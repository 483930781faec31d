//! Interactive training loop

use std::path::Path;

use anyhow::Result;
use console::Style;
use dialoguer::Select;
use garden_core::output::OutputFormatter;
use garden_core::persistence::save_snapshot;
use garden_core::{EnginePhase, Session, TestCase};
use inquire::{InquireError, Select as InquireSelect, Text};

const SCORE_LABELS: [&str; 5] = [
    "1 - Poor",
    "2 - Fair",
    "3 - Good",
    "4 - Very good",
    "5 - Perfect (accept this prompt)",
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum TrainChoice {
    Run,
    Feedback,
    SelectCase,
    AddCase,
    EditCase,
    Regenerate,
    ShowTemplate,
    DebugLog,
    Quit,
}

impl std::fmt::Display for TrainChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainChoice::Run => write!(f, "Run prompt"),
            TrainChoice::Feedback => write!(f, "Give feedback"),
            TrainChoice::SelectCase => write!(f, "Switch training case"),
            TrainChoice::AddCase => write!(f, "Add training case"),
            TrainChoice::EditCase => write!(f, "Edit active case"),
            TrainChoice::Regenerate => write!(f, "Regenerate template"),
            TrainChoice::ShowTemplate => write!(f, "Show template"),
            TrainChoice::DebugLog => write!(f, "Show debug log"),
            TrainChoice::Quit => write!(f, "Quit"),
        }
    }
}

/// Menu entries that make sense in the current phase
fn menu_for(phase: EnginePhase, has_cases: bool) -> Vec<TrainChoice> {
    let mut options = Vec::new();
    match phase {
        EnginePhase::AwaitingFeedback => {
            options.push(TrainChoice::Feedback);
            options.push(TrainChoice::Run);
        }
        EnginePhase::Idle => options.push(TrainChoice::Run),
        EnginePhase::Converged | EnginePhase::Generating => {}
    }
    if has_cases {
        options.push(TrainChoice::SelectCase);
        options.push(TrainChoice::EditCase);
    }
    options.extend([
        TrainChoice::AddCase,
        TrainChoice::Regenerate,
        TrainChoice::ShowTemplate,
        TrainChoice::DebugLog,
        TrainChoice::Quit,
    ]);
    options
}

fn show_train_menu(session: &Session) -> TrainChoice {
    let options = menu_for(session.phase(), !session.training_cases().is_empty());
    InquireSelect::new("Training", options)
        .prompt()
        .unwrap_or(TrainChoice::Quit)
}

fn print_status(session: &Session) {
    let dim = Style::new().dim();
    let case = if session.training_cases().is_empty() {
        "no cases".to_string()
    } else {
        format!(
            "case {} of {}",
            session.active_case() + 1,
            session.training_cases().len()
        )
    };
    println!(
        "\n{}",
        dim.apply_to(format!(
            "[{} | {} | {} iterations]",
            case,
            session.phase(),
            session.iterations().len()
        ))
    );
}

pub async fn handle_train(
    session: &mut Session,
    formatter: &OutputFormatter,
    session_path: &Path,
) -> Result<()> {
    if session.training_cases().is_empty() {
        println!("No training cases available yet. Import a file or add a case.");
    }

    loop {
        print_status(session);
        let choice = show_train_menu(session);
        let step = match choice {
            TrainChoice::Run => run_case(session, formatter).await,
            TrainChoice::Feedback => give_feedback(session, formatter).await,
            TrainChoice::SelectCase => select_case(session),
            TrainChoice::AddCase => session.add_training_case().map(|_| ()).map_err(Into::into),
            TrainChoice::EditCase => edit_case(session),
            TrainChoice::Regenerate => match session.regenerate_template().await {
                Ok(template) => {
                    formatter.print_template(Some(template));
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
            TrainChoice::ShowTemplate => {
                formatter.print_template(session.template());
                Ok(())
            }
            TrainChoice::DebugLog => {
                for line in garden_core::logger::get_recent_logs(20).iter().rev() {
                    println!("{}", line);
                }
                Ok(())
            }
            TrainChoice::Quit => break,
        };

        if let Err(e) = step {
            report_step_error(&e);
        }
        save_snapshot(session_path, &session.snapshot()).await?;
    }

    Ok(())
}

/// Errors inside the loop are shown and the loop continues
fn report_step_error(error: &anyhow::Error) {
    if let Some(InquireError::OperationCanceled | InquireError::OperationInterrupted) =
        error.downcast_ref::<InquireError>()
    {
        return;
    }
    crate::print_error(error);
}

async fn run_case(session: &mut Session, formatter: &OutputFormatter) -> Result<()> {
    let prompt = Text::new("Prompt:")
        .with_initial_value(session.current_prompt())
        .prompt()?;
    let expected = Text::new("Expected output:")
        .with_initial_value(session.expected_output())
        .prompt()?;

    let index = if session.training_cases().is_empty() {
        0
    } else {
        session.active_case()
    };
    let output = session.submit_run(index, &prompt, &expected).await?;
    formatter.print_output(&output);
    Ok(())
}

async fn give_feedback(session: &mut Session, formatter: &OutputFormatter) -> Result<()> {
    let feedback = Text::new("Feedback:")
        .with_help_message("What should change in the output?")
        .prompt()?;
    let score = Select::new()
        .with_prompt("Score")
        .items(&SCORE_LABELS)
        .default(2)
        .interact()?;

    let outcome = session.submit_feedback(&feedback, score as i64 + 1).await?;
    formatter.print_feedback_outcome(&outcome);
    Ok(())
}

fn select_case(session: &mut Session) -> Result<()> {
    let labels: Vec<String> = session
        .training_cases()
        .iter()
        .enumerate()
        .map(|(index, case)| {
            let done = if session.is_converged(index) { " [converged]" } else { "" };
            let prompt = if case.user_prompt.trim().is_empty() {
                "Empty prompt"
            } else {
                case.user_prompt.as_str()
            };
            format!("Case {}: {}{}", index + 1, prompt, done)
        })
        .collect();

    let picked = InquireSelect::new("Training case", labels)
        .with_starting_cursor(session.active_case())
        .raw_prompt()?;
    session.select_training_case(picked.index)?;
    Ok(())
}

fn edit_case(session: &mut Session) -> Result<()> {
    let index = session.active_case();
    let current = session.training_cases()[index].clone();
    let prompt = Text::new("Prompt:")
        .with_initial_value(&current.user_prompt)
        .prompt()?;
    let expected = Text::new("Expected output:")
        .with_initial_value(&current.expected_output)
        .prompt()?;
    session.update_training_case(index, TestCase::new(prompt, expected))?;
    Ok(())
}
