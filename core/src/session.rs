//! Refinement session
//!
//! The host-facing surface of the core. A [`Session`] owns the case sets,
//! the refinement engine and the last validation run, and carries the
//! provider credential in an explicit [`SessionContext`] instead of any
//! process-wide slot. Every operation that reaches the provider checks the
//! credential before touching state.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::Config;
use crate::engine::{
    EnginePhase, FeedbackResult, PromptLibrary, RefinementEngine, SynthesisStatus,
};
use crate::error::{GardenError, OptionExt, Result};
use crate::import::{self, ImportFormat};
use crate::llm::{CompletionProvider, Credential};
use crate::persistence::{PendingOutput, SessionSnapshot, SNAPSHOT_VERSION};
use crate::types::{CaseSplit, Iteration, OptimizedTemplate, Score, TestCase, ValidationResult};
use crate::validation::{ValidationReport, ValidationRunner};

/// Per-session values shared by every outbound request
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    credential: Option<Credential>,
}

impl SessionContext {
    pub fn new(credential: Option<Credential>) -> Self {
        Self { credential }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.resolve_credential())
    }

    pub fn set_credential(&mut self, credential: Option<Credential>) {
        self.credential = credential;
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// The credential, or `CredentialMissing`
    pub fn credential(&self) -> Result<&Credential> {
        self.credential.as_ref().ok_or(GardenError::CredentialMissing)
    }
}

/// Result of rating an output, including the template refresh it triggered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackOutcome {
    pub result: FeedbackResult,
    pub synthesis: SynthesisStatus,
}

pub struct Session {
    id: Uuid,
    provider: Arc<dyn CompletionProvider>,
    context: SessionContext,
    engine: RefinementEngine,
    validation: ValidationRunner,
    training: Vec<TestCase>,
    testing: Vec<TestCase>,
    active_case: usize,
    expected_output: String,
    converged: BTreeSet<usize>,
    results: Vec<ValidationResult>,
    default_training_count: usize,
}

impl Session {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        context: SessionContext,
        config: &Config,
    ) -> Result<Self> {
        let prompts = PromptLibrary::new(&config.training)?;
        Ok(Self {
            id: Uuid::new_v4(),
            provider,
            context,
            engine: RefinementEngine::new(prompts.clone()),
            validation: ValidationRunner::new(prompts, config.validation.max_concurrency),
            training: Vec::new(),
            testing: Vec::new(),
            active_case: 0,
            expected_output: String::new(),
            converged: BTreeSet::new(),
            results: Vec::new(),
            default_training_count: config.training.default_training_count,
        })
    }

    /// Resume from a snapshot, including an output still waiting for feedback
    pub fn from_snapshot(
        provider: Arc<dyn CompletionProvider>,
        context: SessionContext,
        config: &Config,
        snapshot: SessionSnapshot,
    ) -> Result<Self> {
        let mut session = Self::new(provider, context, config)?;
        let prompts = session.engine.prompts().clone();

        session.id = snapshot.id;
        session.engine = RefinementEngine::restore(prompts, snapshot.iterations, snapshot.template);
        session.converged = snapshot
            .converged
            .into_iter()
            .filter(|&index| index < snapshot.training.len())
            .collect();
        session.training = snapshot.training;
        session.testing = snapshot.testing;
        session.results = snapshot.results;

        if !session.training.is_empty() {
            let active = snapshot.active_case.min(session.training.len() - 1);
            session.activate(active)?;
            if let Some(pending) = snapshot.pending {
                if active == snapshot.active_case && !session.converged.contains(&active) {
                    session.engine.resume_output(pending.prompt, pending.output)?;
                }
            }
        }
        Ok(session)
    }

    fn pending_output(&self) -> Option<PendingOutput> {
        if self.engine.phase() != EnginePhase::AwaitingFeedback {
            return None;
        }
        self.engine.current_output().map(|output| PendingOutput {
            prompt: self.engine.current_prompt().to_string(),
            output: output.to_string(),
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            id: self.id,
            saved_at: chrono::Utc::now(),
            training: self.training.clone(),
            testing: self.testing.clone(),
            iterations: self.engine.iterations().to_vec(),
            active_case: self.active_case,
            converged: self.converged.iter().copied().collect(),
            template: self.engine.template().cloned(),
            results: self.results.clone(),
            pending: self.pending_output(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    pub fn training_cases(&self) -> &[TestCase] {
        &self.training
    }

    pub fn testing_cases(&self) -> &[TestCase] {
        &self.testing
    }

    pub fn active_case(&self) -> usize {
        self.active_case
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    pub fn is_converged(&self, index: usize) -> bool {
        self.converged.contains(&index)
    }

    pub fn phase(&self) -> EnginePhase {
        self.engine.phase()
    }

    pub fn current_prompt(&self) -> &str {
        self.engine.current_prompt()
    }

    pub fn current_output(&self) -> Option<&str> {
        self.engine.current_output()
    }

    pub fn iterations(&self) -> &[Iteration] {
        self.engine.iterations()
    }

    pub fn template(&self) -> Option<&OptimizedTemplate> {
        self.engine.template()
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    /// The last validation run with its aggregate
    pub fn report(&self) -> ValidationReport {
        ValidationReport::from_results(self.results.clone())
    }

    pub fn default_training_count(&self) -> usize {
        self.default_training_count
    }

    pub fn set_max_concurrency(&mut self, max_concurrency: usize) {
        self.validation = ValidationRunner::new(self.engine.prompts().clone(), max_concurrency);
    }

    // ========================================================================
    // Training
    // ========================================================================

    /// Generate an output for `prompt` as training case `case_index`
    ///
    /// `case_index == training_cases().len()` runs a new case, which is
    /// appended unless a case with the same prompt already exists. Cases are
    /// only changed once the provider succeeds.
    pub async fn submit_run(
        &mut self,
        case_index: usize,
        prompt: &str,
        expected_output: &str,
    ) -> Result<String> {
        let credential = self.context.credential()?;
        if case_index > self.training.len() {
            return Err(GardenError::invalid_state(format!(
                "training case {} does not exist ({} cases)",
                case_index + 1,
                self.training.len()
            )));
        }

        // a new case whose prompt already exists reuses that case
        let existing = if case_index == self.training.len() {
            self.training.iter().position(|c| c.user_prompt == prompt)
        } else {
            None
        };
        let target = existing.unwrap_or(case_index);

        let provider = self.provider.as_ref();
        let output = if target != self.active_case || target == self.training.len() {
            let converged = self.converged.contains(&target);
            self.engine
                .run_as(provider, credential, prompt, converged)
                .await?
        } else {
            self.engine.run(provider, credential, prompt).await?
        };

        let case = TestCase::new(prompt, expected_output);
        match existing {
            Some(_) => {}
            None if target < self.training.len() => self.training[target] = case,
            None => self.training.push(case),
        }
        self.active_case = target;
        self.expected_output = expected_output.to_string();
        Ok(output)
    }

    /// Rate the current output and refresh the template
    pub async fn submit_feedback(&mut self, feedback: &str, score: i64) -> Result<FeedbackOutcome> {
        let credential = self.context.credential()?;
        let provider = self.provider.as_ref();

        let result = self
            .engine
            .submit_feedback(provider, credential, feedback, Score::new(score))
            .await?;
        if result == FeedbackResult::Converged {
            self.converged.insert(self.active_case);
        }

        let synthesis = self.engine.refresh_template(provider, credential).await;
        Ok(FeedbackOutcome { result, synthesis })
    }

    /// Re-synthesize the template on demand
    pub async fn regenerate_template(&mut self) -> Result<&OptimizedTemplate> {
        let credential = self.context.credential()?;
        self.engine
            .regenerate_template(self.provider.as_ref(), credential)
            .await
    }

    /// Run the active case if it has no output yet
    ///
    /// Returns the generated output, or `None` when there was nothing to run.
    pub async fn run_active(&mut self) -> Result<Option<String>> {
        self.context.credential()?;
        if self.training.is_empty() || self.engine.phase() != EnginePhase::Idle {
            return Ok(None);
        }
        let case = self.training[self.active_case].clone();
        crate::info_log!(
            "Running active case {} of {}",
            self.active_case + 1,
            self.training.len()
        );
        self.submit_run(self.active_case, &case.user_prompt, &case.expected_output)
            .await
            .map(Some)
    }

    /// Return to the pre-call state after a dropped provider future
    pub fn abandon(&mut self) {
        self.engine.abandon();
    }

    // ========================================================================
    // Case management
    // ========================================================================

    /// Append an empty training case and make it active
    pub fn add_training_case(&mut self) -> Result<usize> {
        let index = self.training.len();
        self.engine.select_case(String::new(), false)?;
        self.training.push(TestCase::default());
        self.active_case = index;
        self.expected_output.clear();
        Ok(index)
    }

    pub fn select_training_case(&mut self, index: usize) -> Result<()> {
        if index >= self.training.len() {
            return Err(GardenError::invalid_state(format!(
                "training case {} does not exist ({} cases)",
                index + 1,
                self.training.len()
            )));
        }
        self.activate(index)
    }

    pub fn update_training_case(&mut self, index: usize, case: TestCase) -> Result<()> {
        let slot = self
            .training
            .get_mut(index)
            .ok_or_invalid_state(format!("training case {} does not exist", index + 1))?;
        *slot = case;
        if index == self.active_case {
            let case = &self.training[index];
            self.expected_output = case.expected_output.clone();
            if self.engine.phase() == EnginePhase::Idle {
                self.engine.select_case(case.user_prompt.clone(), false)?;
            }
        }
        Ok(())
    }

    pub fn add_testing_case(&mut self, case: TestCase) -> Result<usize> {
        if !case.is_complete() {
            return Err(GardenError::invalid_state(
                "a testing case needs both a prompt and an expected output",
            ));
        }
        self.testing.push(case);
        Ok(self.testing.len() - 1)
    }

    /// Remove a testing case along with its result from the last run
    pub fn remove_testing_case(&mut self, index: usize) -> Result<TestCase> {
        if index >= self.testing.len() {
            return Err(GardenError::invalid_state(format!(
                "testing case {} does not exist ({} cases)",
                index + 1,
                self.testing.len()
            )));
        }
        if index < self.results.len() {
            self.results.remove(index);
        }
        Ok(self.testing.remove(index))
    }

    fn activate(&mut self, index: usize) -> Result<()> {
        let case = &self.training[index];
        self.engine
            .select_case(case.user_prompt.clone(), self.converged.contains(&index))?;
        self.expected_output = case.expected_output.clone();
        self.active_case = index;
        Ok(())
    }

    // ========================================================================
    // Import
    // ========================================================================

    /// Replace both case sets from an import
    ///
    /// The iteration log and template survive; per-case convergence and old
    /// validation results do not.
    pub fn import_cases(
        &mut self,
        content: &[u8],
        format: ImportFormat,
        training_count: usize,
    ) -> Result<CaseSplit> {
        let split = import::import(content, format, training_count)?;
        self.apply_split(split.clone())?;
        Ok(split)
    }

    pub async fn import_file(
        &mut self,
        path: &Path,
        format: Option<ImportFormat>,
        training_count: Option<usize>,
    ) -> Result<CaseSplit> {
        let count = training_count.unwrap_or(self.default_training_count);
        let split = import::import_file(path, format, count).await?;
        self.apply_split(split.clone())?;
        Ok(split)
    }

    fn apply_split(&mut self, split: CaseSplit) -> Result<()> {
        if let Some(first) = split.training.first() {
            self.engine.select_case(first.user_prompt.clone(), false)?;
            self.expected_output = first.expected_output.clone();
        }
        self.training = split.training;
        self.testing = split.testing;
        self.active_case = 0;
        self.converged.clear();
        self.results.clear();
        Ok(())
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Validate the template against every testing case
    ///
    /// Rejected before any request when the credential, the template or the
    /// testing set is missing. On failure the previous results are kept.
    pub async fn run_validation(&mut self) -> Result<ValidationReport> {
        let credential = self.context.credential()?;
        let template = match self.engine.template() {
            Some(template) if !template.is_empty() => template,
            _ => {
                return Err(GardenError::invalid_state(
                    "no optimized template yet; complete the training phase first",
                ))
            }
        };
        if self.testing.is_empty() {
            return Err(GardenError::invalid_state("there are no testing cases to run"));
        }

        let report = self
            .validation
            .run(
                self.provider.as_ref(),
                credential,
                template,
                &self.testing,
                self.engine.iterations(),
            )
            .await?;
        self.results = report.results.clone();
        Ok(report)
    }
}
