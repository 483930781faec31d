//! Refinement state for the active training case
//!
//! Pure transitions, no provider access. The engine asks for a transition
//! before it suspends on a provider call and commits or abandons it after.

use crate::error::{GardenError, Result};
use crate::types::{Iteration, Score};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// No output for the active case yet
    Idle,
    /// A provider call is in flight
    Generating,
    /// An output is waiting for feedback
    AwaitingFeedback,
    /// A top score accepted the prompt; terminal for this case
    Converged,
}

impl std::fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EnginePhase::Idle => "idle",
            EnginePhase::Generating => "generating",
            EnginePhase::AwaitingFeedback => "awaiting feedback",
            EnginePhase::Converged => "converged",
        };
        f.write_str(label)
    }
}

/// Work the engine still has to finish before leaving `Generating`
#[derive(Debug, Clone)]
enum Pending {
    Run {
        prompt: String,
        resume: Resume,
    },
    Improve {
        iteration: Iteration,
        resume: Resume,
    },
}

/// What to restore if the in-flight call fails or is dropped
#[derive(Debug, Clone)]
struct Resume {
    phase: EnginePhase,
    output: Option<String>,
}

/// Result of accepting feedback for the current output
#[derive(Debug, Clone)]
pub enum FeedbackStep {
    /// Score 5: record this iteration; the prompt is the template
    Accepted(Iteration),
    /// Score below 5: call the provider for a revised output
    Improve(Iteration),
}

#[derive(Debug, Clone)]
pub struct CaseState {
    phase: EnginePhase,
    prompt: String,
    output: Option<String>,
    pending: Option<Pending>,
}

impl Default for CaseState {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseState {
    pub fn new() -> Self {
        Self {
            phase: EnginePhase::Idle,
            prompt: String::new(),
            output: None,
            pending: None,
        }
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Switch to another case; converged cases stay converged
    pub fn select(&mut self, prompt: String, converged: bool) -> Result<()> {
        self.ensure_not_generating("switch training cases")?;
        self.prompt = prompt;
        self.output = None;
        self.phase = if converged {
            EnginePhase::Converged
        } else {
            EnginePhase::Idle
        };
        Ok(())
    }

    /// Restore an unrated output from a saved session
    pub fn resume(&mut self, prompt: String, output: String) -> Result<()> {
        if self.phase != EnginePhase::Idle {
            return Err(GardenError::invalid_state(format!(
                "cannot resume a saved output while the engine is {}",
                self.phase
            )));
        }
        self.prompt = prompt;
        self.output = Some(output);
        self.phase = EnginePhase::AwaitingFeedback;
        Ok(())
    }

    /// Start a generation for `prompt`
    pub fn begin_run(&mut self, prompt: &str) -> Result<()> {
        match self.phase {
            EnginePhase::Idle | EnginePhase::AwaitingFeedback => {}
            EnginePhase::Generating => {
                return Err(GardenError::invalid_state(
                    "a generation is already in flight for this case",
                ))
            }
            EnginePhase::Converged => {
                return Err(GardenError::invalid_state(
                    "this case has converged; select another training case",
                ))
            }
        }
        if prompt.trim().is_empty() {
            return Err(GardenError::invalid_state("the prompt is empty"));
        }
        self.pending = Some(Pending::Run {
            prompt: prompt.to_string(),
            resume: self.resume_point(),
        });
        self.phase = EnginePhase::Generating;
        Ok(())
    }

    /// Commit a successful generation
    pub fn finish_run(&mut self, output: String) -> Result<()> {
        match self.pending.take() {
            Some(Pending::Run { prompt, .. }) => {
                self.prompt = prompt;
                self.output = Some(output);
                self.phase = EnginePhase::AwaitingFeedback;
                Ok(())
            }
            other => {
                self.pending = other;
                Err(GardenError::invalid_state("no generation is in flight"))
            }
        }
    }

    /// Turn feedback into the next step; only valid while awaiting feedback
    pub fn begin_feedback(&mut self, feedback: &str, score: Score) -> Result<FeedbackStep> {
        if self.phase != EnginePhase::AwaitingFeedback {
            return Err(GardenError::invalid_state(format!(
                "no generated output is awaiting feedback (engine is {})",
                self.phase
            )));
        }
        let output = match &self.output {
            Some(output) => output.clone(),
            None => return Err(GardenError::invalid_state("no generated output to rate")),
        };
        let iteration = Iteration {
            prompt: self.prompt.clone(),
            output,
            feedback: feedback.to_string(),
            score,
        };

        if score.is_accepted() {
            self.phase = EnginePhase::Converged;
            return Ok(FeedbackStep::Accepted(iteration));
        }

        self.pending = Some(Pending::Improve {
            iteration: iteration.clone(),
            resume: self.resume_point(),
        });
        self.phase = EnginePhase::Generating;
        Ok(FeedbackStep::Improve(iteration))
    }

    /// Commit a revised output, handing back the iteration to record
    pub fn finish_improvement(&mut self, output: String) -> Result<Iteration> {
        match self.pending.take() {
            Some(Pending::Improve { iteration, .. }) => {
                self.output = Some(output);
                self.phase = EnginePhase::AwaitingFeedback;
                Ok(iteration)
            }
            other => {
                self.pending = other;
                Err(GardenError::invalid_state("no improvement is in flight"))
            }
        }
    }

    /// Drop the in-flight call and restore the state from before it
    ///
    /// Returns `false` when nothing was in flight.
    pub fn abandon(&mut self) -> bool {
        let resume = match self.pending.take() {
            Some(Pending::Run { resume, .. }) | Some(Pending::Improve { resume, .. }) => resume,
            None => return false,
        };
        self.phase = resume.phase;
        self.output = resume.output;
        true
    }

    fn resume_point(&self) -> Resume {
        Resume {
            phase: self.phase,
            output: self.output.clone(),
        }
    }

    fn ensure_not_generating(&self, action: &str) -> Result<()> {
        if self.phase == EnginePhase::Generating {
            return Err(GardenError::invalid_state(format!(
                "cannot {} while a generation is in flight",
                action
            )));
        }
        Ok(())
    }
}
