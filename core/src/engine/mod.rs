//! Refinement engine
//!
//! Drives the training loop for one active case at a time: generates an
//! output, takes feedback, asks for improvements until a top score accepts
//! the prompt, and keeps the optimized template in sync with the iteration
//! log.
//!
//! # Template lifecycle
//!
//! Recording an iteration bumps the store's revision. [`RefinementEngine::refresh_template`]
//! observes that revision and re-synthesizes the template when it changed,
//! unless the active case has converged. A failed synthesis keeps the
//! previous template.
//!
//! # Cancellation
//!
//! Provider calls are awaited with `&mut self` held. If the caller drops one
//! of these futures the engine stays in [`EnginePhase::Generating`]; call
//! [`RefinementEngine::abandon`] to return to the state before the call.

pub mod prompts;
pub mod state;

pub use prompts::PromptLibrary;
pub use state::{CaseState, EnginePhase, FeedbackStep};

use tokio::sync::watch;

use crate::error::{GardenError, Result};
use crate::llm::{CompletionProvider, Credential};
use crate::store::IterationStore;
use crate::types::{Iteration, OptimizedTemplate, Score, TemplateSource};

/// What happened to the output after feedback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackResult {
    /// Score 5: the prompt became the template
    Converged,
    /// The provider returned a revised output, now awaiting feedback
    Improved { output: String },
}

/// Outcome of an observer-driven template refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisStatus {
    Refreshed,
    /// Nothing changed, or synthesis is not permitted right now
    Skipped,
    /// The provider failed; the previous template is still live
    Failed(String),
}

pub struct RefinementEngine {
    state: CaseState,
    store: IterationStore,
    revision: watch::Receiver<usize>,
    template: Option<OptimizedTemplate>,
    prompts: PromptLibrary,
}

impl RefinementEngine {
    pub fn new(prompts: PromptLibrary) -> Self {
        Self::restore(prompts, Vec::new(), None)
    }

    /// Rebuild an engine from a saved log; it starts idle
    pub fn restore(
        prompts: PromptLibrary,
        iterations: Vec<Iteration>,
        template: Option<OptimizedTemplate>,
    ) -> Self {
        let store = IterationStore::from_iterations(iterations);
        let revision = store.subscribe();
        Self {
            state: CaseState::new(),
            store,
            revision,
            template,
            prompts,
        }
    }

    pub fn phase(&self) -> EnginePhase {
        self.state.phase()
    }

    pub fn current_prompt(&self) -> &str {
        self.state.prompt()
    }

    pub fn current_output(&self) -> Option<&str> {
        self.state.output()
    }

    pub fn iterations(&self) -> &[Iteration] {
        self.store.all()
    }

    pub fn store(&self) -> &IterationStore {
        &self.store
    }

    pub fn template(&self) -> Option<&OptimizedTemplate> {
        self.template.as_ref()
    }

    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    /// Make `prompt` the active case
    pub fn select_case(&mut self, prompt: impl Into<String>, converged: bool) -> Result<()> {
        self.state.select(prompt.into(), converged)
    }

    /// Return to the state before an in-flight call whose future was dropped
    pub fn abandon(&mut self) {
        if self.state.abandon() {
            crate::warn_log!("Abandoned in-flight provider call");
        }
    }

    /// Generate an output for `prompt`
    ///
    /// On failure the engine is back in the phase it was in before the call.
    pub async fn run(
        &mut self,
        provider: &dyn CompletionProvider,
        credential: &Credential,
        prompt: &str,
    ) -> Result<String> {
        self.state.begin_run(prompt)?;
        crate::info_log!("Generating output ({} chars of prompt)", prompt.len());

        match provider.complete(prompt, credential).await {
            Ok(output) => {
                self.state.finish_run(output.clone())?;
                crate::info_log!("Output ready, awaiting feedback");
                Ok(output)
            }
            Err(e) => {
                self.state.abandon();
                crate::error_log!("Generation failed: {}", e);
                Err(e)
            }
        }
    }

    /// Switch to another case and generate an output for it
    ///
    /// The switch only sticks when the call succeeds; on any error the case
    /// that was active before, with its phase and pending output, is restored.
    pub async fn run_as(
        &mut self,
        provider: &dyn CompletionProvider,
        credential: &Credential,
        prompt: &str,
        converged: bool,
    ) -> Result<String> {
        let previous = self.state.clone();
        self.state.select(prompt.to_string(), converged)?;
        let result = self.run(provider, credential, prompt).await;
        if result.is_err() {
            self.state = previous;
        }
        result
    }

    /// Bring back an output that was waiting for feedback when the session was saved
    pub fn resume_output(
        &mut self,
        prompt: impl Into<String>,
        output: impl Into<String>,
    ) -> Result<()> {
        self.state.resume(prompt.into(), output.into())
    }

    /// Rate the current output
    ///
    /// A top score records the iteration and accepts the prompt verbatim as
    /// the template without calling the provider. Any other score asks the
    /// provider for a revised output; the iteration is recorded only once
    /// that call succeeds.
    pub async fn submit_feedback(
        &mut self,
        provider: &dyn CompletionProvider,
        credential: &Credential,
        feedback: &str,
        score: Score,
    ) -> Result<FeedbackResult> {
        match self.state.begin_feedback(feedback, score)? {
            FeedbackStep::Accepted(iteration) => {
                let prompt = iteration.prompt.clone();
                self.store.record(iteration);
                self.template = Some(OptimizedTemplate {
                    text: prompt,
                    source: TemplateSource::Accepted,
                    iterations: self.store.len(),
                });
                crate::info_log!(
                    "Case converged after {} iterations; prompt accepted as template",
                    self.store.len()
                );
                Ok(FeedbackResult::Converged)
            }
            FeedbackStep::Improve(iteration) => {
                let request = match self.prompts.improvement(
                    &iteration.prompt,
                    &iteration.output,
                    &iteration.feedback,
                    iteration.score.value(),
                ) {
                    Ok(request) => request,
                    Err(e) => {
                        self.state.abandon();
                        return Err(e);
                    }
                };

                match provider.complete(&request, credential).await {
                    Ok(output) => {
                        let iteration = self.state.finish_improvement(output.clone())?;
                        crate::info_log!(
                            "Recorded iteration {} (score {})",
                            self.store.len() + 1,
                            iteration.score
                        );
                        self.store.record(iteration);
                        Ok(FeedbackResult::Improved { output })
                    }
                    Err(e) => {
                        self.state.abandon();
                        crate::error_log!("Improvement request failed: {}", e);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Whether a recorded iteration has not been synthesized yet
    pub fn needs_synthesis(&self) -> bool {
        self.revision.has_changed().unwrap_or(false)
    }

    fn synthesis_permitted(&self) -> bool {
        self.state.phase() != EnginePhase::Converged
            && !self.state.prompt().trim().is_empty()
            && !self.store.is_empty()
    }

    /// Re-synthesize the template if the log changed since the last refresh
    pub async fn refresh_template(
        &mut self,
        provider: &dyn CompletionProvider,
        credential: &Credential,
    ) -> SynthesisStatus {
        if !self.needs_synthesis() {
            return SynthesisStatus::Skipped;
        }
        self.revision.borrow_and_update();

        if !self.synthesis_permitted() {
            crate::debug_log!("Synthesis skipped (phase {})", self.state.phase());
            return SynthesisStatus::Skipped;
        }

        match self.synthesize(provider, credential).await {
            Ok(()) => SynthesisStatus::Refreshed,
            Err(e) => SynthesisStatus::Failed(e.to_string()),
        }
    }

    /// Re-synthesize on demand, even after convergence
    pub async fn regenerate_template(
        &mut self,
        provider: &dyn CompletionProvider,
        credential: &Credential,
    ) -> Result<&OptimizedTemplate> {
        if self.store.is_empty() {
            return Err(GardenError::invalid_state(
                "nothing to synthesize: no iterations recorded yet",
            ));
        }
        if self.state.prompt().trim().is_empty() {
            return Err(GardenError::invalid_state(
                "nothing to synthesize: the active case has no prompt",
            ));
        }
        self.revision.borrow_and_update();
        self.synthesize(provider, credential).await?;
        self.template
            .as_ref()
            .ok_or_else(|| GardenError::invalid_state("template missing after synthesis"))
    }

    async fn synthesize(
        &mut self,
        provider: &dyn CompletionProvider,
        credential: &Credential,
    ) -> Result<()> {
        let request = self.prompts.synthesis(self.store.all())?;
        match provider.complete(&request, credential).await {
            Ok(text) => {
                crate::info_log!(
                    "Template synthesized from {} iterations ({} chars)",
                    self.store.len(),
                    text.len()
                );
                self.template = Some(OptimizedTemplate {
                    text,
                    source: TemplateSource::Synthesized,
                    iterations: self.store.len(),
                });
                Ok(())
            }
            Err(e) => {
                crate::error_log!("Synthesis failed, keeping previous template: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::testing::{credential, Reply, ScriptedProvider};

    fn engine() -> RefinementEngine {
        RefinementEngine::new(PromptLibrary::new(&TrainingConfig::default()).unwrap())
    }

    async fn awaiting_feedback(provider: &ScriptedProvider) -> RefinementEngine {
        let mut engine = engine();
        engine
            .run(provider, &credential(), "Write a haiku about rain")
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn test_run_sends_prompt_verbatim() {
        let provider = ScriptedProvider::with_replies([Reply::text("Drops on tin roofs")]);
        let engine = awaiting_feedback(&provider).await;

        assert_eq!(provider.prompts(), vec!["Write a haiku about rain"]);
        assert_eq!(engine.phase(), EnginePhase::AwaitingFeedback);
        assert_eq!(engine.current_output(), Some("Drops on tin roofs"));
        assert!(engine.iterations().is_empty());
    }

    #[tokio::test]
    async fn test_failed_run_returns_to_idle() {
        let provider = ScriptedProvider::with_replies([Reply::Fail(503)]);
        let mut engine = engine();
        let err = engine
            .run(&provider, &credential(), "prompt")
            .await
            .unwrap_err();

        assert!(matches!(err, GardenError::Transport { status: Some(503), .. }));
        assert_eq!(engine.phase(), EnginePhase::Idle);
        assert!(engine.current_output().is_none());
    }

    #[tokio::test]
    async fn test_top_score_accepts_prompt_without_provider_call() {
        let provider = ScriptedProvider::with_replies([Reply::text("output")]);
        let mut engine = awaiting_feedback(&provider).await;

        let result = engine
            .submit_feedback(&provider, &credential(), "perfect", Score::new(5))
            .await
            .unwrap();

        assert_eq!(result, FeedbackResult::Converged);
        assert_eq!(engine.phase(), EnginePhase::Converged);
        assert_eq!(provider.calls(), 1);
        assert_eq!(engine.iterations().len(), 1);

        let template = engine.template().unwrap();
        assert_eq!(template.text, "Write a haiku about rain");
        assert_eq!(template.source, TemplateSource::Accepted);

        // converged cases never re-synthesize through the observer
        let status = engine.refresh_template(&provider, &credential()).await;
        assert_eq!(status, SynthesisStatus::Skipped);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_low_score_records_once_and_calls_once() {
        let provider = ScriptedProvider::with_replies([
            Reply::text("first draft"),
            Reply::text("second draft"),
        ]);
        let mut engine = awaiting_feedback(&provider).await;

        let result = engine
            .submit_feedback(&provider, &credential(), "mention thunder", Score::new(2))
            .await
            .unwrap();

        assert_eq!(
            result,
            FeedbackResult::Improved {
                output: "second draft".to_string()
            }
        );
        assert_eq!(provider.calls(), 2);
        assert_eq!(engine.iterations().len(), 1);

        let iteration = &engine.iterations()[0];
        assert_eq!(iteration.output, "first draft");
        assert_eq!(iteration.feedback, "mention thunder");
        assert_eq!(iteration.score.value(), 2);

        let request = &provider.prompts()[1];
        assert!(request.contains("Initial Prompt: Write a haiku about rain"));
        assert!(request.contains("Generated Output: first draft"));
        assert!(request.contains("User Feedback (Score 2/5): mention thunder"));

        assert_eq!(engine.phase(), EnginePhase::AwaitingFeedback);
        assert_eq!(engine.current_output(), Some("second draft"));
    }

    #[tokio::test]
    async fn test_failed_improvement_records_nothing() {
        let provider = ScriptedProvider::with_replies([Reply::text("draft"), Reply::Fail(500)]);
        let mut engine = awaiting_feedback(&provider).await;

        let err = engine
            .submit_feedback(&provider, &credential(), "shorter", Score::new(3))
            .await
            .unwrap_err();

        assert!(matches!(err, GardenError::Transport { .. }));
        assert!(engine.iterations().is_empty());
        assert!(!engine.needs_synthesis());
        assert_eq!(engine.phase(), EnginePhase::AwaitingFeedback);
        assert_eq!(engine.current_output(), Some("draft"));
    }

    #[tokio::test]
    async fn test_feedback_without_output_is_invalid() {
        let provider = ScriptedProvider::new();
        let mut engine = engine();
        let err = engine
            .submit_feedback(&provider, &credential(), "meh", Score::new(3))
            .await
            .unwrap_err();
        assert!(matches!(err, GardenError::InvalidState { .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_recording_triggers_single_synthesis() {
        let provider = ScriptedProvider::with_replies([
            Reply::text("draft"),
            Reply::text("better draft"),
            Reply::text("Core Objective: haiku"),
        ]);
        let mut engine = awaiting_feedback(&provider).await;
        engine
            .submit_feedback(&provider, &credential(), "more rain", Score::new(3))
            .await
            .unwrap();
        assert!(engine.needs_synthesis());

        let status = engine.refresh_template(&provider, &credential()).await;
        assert_eq!(status, SynthesisStatus::Refreshed);
        let template = engine.template().unwrap();
        assert_eq!(template.text, "Core Objective: haiku");
        assert_eq!(template.source, TemplateSource::Synthesized);
        assert_eq!(template.iterations, 1);
        assert!(provider.prompts()[2].contains("- more rain"));

        // no new record, no new request
        let status = engine.refresh_template(&provider, &credential()).await;
        assert_eq!(status, SynthesisStatus::Skipped);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_failed_synthesis_keeps_stale_template() {
        let provider = ScriptedProvider::with_replies([
            Reply::text("draft"),
            Reply::text("draft 2"),
            Reply::text("Template v1"),
            Reply::text("draft 3"),
            Reply::Fail(502),
        ]);
        let mut engine = awaiting_feedback(&provider).await;
        let credential = credential();

        engine
            .submit_feedback(&provider, &credential, "a", Score::new(2))
            .await
            .unwrap();
        engine.refresh_template(&provider, &credential).await;

        engine
            .submit_feedback(&provider, &credential, "b", Score::new(3))
            .await
            .unwrap();
        let status = engine.refresh_template(&provider, &credential).await;

        assert!(matches!(status, SynthesisStatus::Failed(_)));
        assert_eq!(engine.template().unwrap().text, "Template v1");
        assert_eq!(engine.iterations().len(), 2);
    }

    #[tokio::test]
    async fn test_regenerate_on_demand() {
        let provider = ScriptedProvider::with_replies([
            Reply::text("draft"),
            Reply::text("Template v2"),
        ]);
        let mut engine = engine();
        let credential = credential();

        let err = engine
            .regenerate_template(&provider, &credential)
            .await
            .unwrap_err();
        assert!(matches!(err, GardenError::InvalidState { .. }));

        engine.run(&provider, &credential, "prompt").await.unwrap();
        engine
            .submit_feedback(&provider, &credential, "good", Score::new(5))
            .await
            .unwrap();

        let template = engine
            .regenerate_template(&provider, &credential)
            .await
            .unwrap();
        assert_eq!(template.text, "Template v2");
        assert_eq!(template.source, TemplateSource::Synthesized);
        assert!(!engine.needs_synthesis());
    }

    #[tokio::test]
    async fn test_abandon_after_dropped_call() {
        let provider = ScriptedProvider::with_replies([Reply::Delayed(
            "late".to_string(),
            std::time::Duration::from_secs(5),
        )]);
        let mut engine = engine();
        let credential = credential();

        let call = engine.run(&provider, &credential, "prompt");
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(10), call).await;
        assert!(timed_out.is_err());
        assert_eq!(engine.phase(), EnginePhase::Generating);

        engine.abandon();
        assert_eq!(engine.phase(), EnginePhase::Idle);
    }
}
