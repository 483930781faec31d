//! Validation runner
//!
//! Runs the optimized template against held-out cases and scores each
//! response against the case's expected output. Cases are independent, so
//! up to `max_concurrency` requests run at once; results are written into
//! per-case slots and always come back in input order.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::engine::PromptLibrary;
use crate::error::{GardenError, Result};
use crate::llm::{CompletionProvider, Credential};
use crate::similarity;
use crate::types::{Iteration, OptimizedTemplate, TestCase, ValidationResult};

/// Per-case results plus their rounded mean
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub results: Vec<ValidationResult>,
    /// `None` when there are no results
    pub average: Option<f64>,
}

impl ValidationReport {
    pub fn from_results(results: Vec<ValidationResult>) -> Self {
        let scores: Vec<f64> = results.iter().map(|r| r.similarity_score).collect();
        Self {
            average: similarity::average(&scores),
            results,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

pub struct ValidationRunner {
    prompts: PromptLibrary,
    max_concurrency: usize,
}

impl ValidationRunner {
    pub fn new(prompts: PromptLibrary, max_concurrency: usize) -> Self {
        Self {
            prompts,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run every case once and score it
    ///
    /// Rejects an empty template before any request. An empty case list is
    /// a no-op. The first provider error aborts the run with no partial
    /// results.
    pub async fn run(
        &self,
        provider: &dyn CompletionProvider,
        credential: &Credential,
        template: &OptimizedTemplate,
        cases: &[TestCase],
        iterations: &[Iteration],
    ) -> Result<ValidationReport> {
        if template.is_empty() {
            return Err(GardenError::invalid_state(
                "the optimized template is empty; complete training first",
            ));
        }
        if cases.is_empty() {
            return Ok(ValidationReport::default());
        }

        let requests = cases
            .iter()
            .map(|case| self.prompts.validation(case, &template.text, iterations))
            .collect::<Result<Vec<_>>>()?;

        crate::info_log!(
            "Validating {} cases (concurrency {})",
            cases.len(),
            self.max_concurrency
        );

        let semaphore = Semaphore::new(self.max_concurrency);
        let calls = requests.iter().enumerate().map(|(index, request)| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| GardenError::invalid_state("validation was cancelled"))?;
                let actual = provider.complete(request, credential).await?;
                Ok::<_, GardenError>((index, actual))
            }
        });

        let completed = match try_join_all(calls).await {
            Ok(completed) => completed,
            Err(e) => {
                crate::error_log!("Validation aborted: {}", e);
                return Err(e);
            }
        };

        let mut slots: Vec<Option<ValidationResult>> = vec![None; cases.len()];
        for (index, actual) in completed {
            let case = &cases[index];
            slots[index] = Some(ValidationResult {
                input: case.user_prompt.clone(),
                expected: case.expected_output.clone(),
                similarity_score: similarity::score(&case.expected_output, &actual),
                actual,
            });
        }

        let report = ValidationReport::from_results(slots.into_iter().flatten().collect());
        crate::info_log!(
            "Validation finished: {} results, average {:?}",
            report.results.len(),
            report.average
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::testing::{credential, Reply, ScriptedProvider};
    use crate::types::{Score, TemplateSource};
    use std::time::Duration;

    fn runner(max_concurrency: usize) -> ValidationRunner {
        let prompts = PromptLibrary::new(&TrainingConfig::default()).unwrap();
        ValidationRunner::new(prompts, max_concurrency)
    }

    fn template(text: &str) -> OptimizedTemplate {
        OptimizedTemplate {
            text: text.to_string(),
            source: TemplateSource::Synthesized,
            iterations: 1,
        }
    }

    fn cases(n: usize) -> Vec<TestCase> {
        (0..n)
            .map(|i| TestCase::new(format!("case-{}", i), format!("answer number {}", i)))
            .collect()
    }

    /// Answers each case correctly, later cases finishing first
    fn reversed_latency(n: usize) -> ScriptedProvider {
        ScriptedProvider::with_responder(move |prompt| {
            for i in 0..n {
                if prompt.contains(&format!("Initial Prompt: \"case-{}\"", i)) {
                    let delay = Duration::from_millis(((n - i) * 15) as u64);
                    return Reply::Delayed(format!("answer number {}", i), delay);
                }
            }
            Reply::Fail(500)
        })
    }

    #[tokio::test]
    async fn test_empty_cases_make_no_calls() {
        let provider = ScriptedProvider::new();
        let report = runner(1)
            .run(&provider, &credential(), &template("T"), &[], &[])
            .await
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(report.average, None);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_template_rejected_before_requests() {
        let provider = ScriptedProvider::new();
        let err = runner(1)
            .run(&provider, &credential(), &template("  "), &cases(2), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GardenError::InvalidState { .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_sequential_scores_and_average() {
        let provider = ScriptedProvider::with_replies([
            Reply::text("answer number 0"),
            Reply::text("something else entirely"),
        ]);
        let iterations = vec![Iteration {
            prompt: "p".to_string(),
            output: "o".to_string(),
            feedback: "be exact".to_string(),
            score: Score::new(4),
        }];
        let report = runner(1)
            .run(&provider, &credential(), &template("T"), &cases(2), &iterations)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].similarity_score, 100.0);
        assert_eq!(report.results[0].input, "case-0");
        assert!(report.results[1].similarity_score < 50.0);
        let expected_average =
            similarity::average(&[100.0, report.results[1].similarity_score]);
        assert_eq!(report.average, expected_average);

        let first = &provider.prompts()[0];
        assert!(first.contains("Expected Output Format: \"answer number 0\""));
        assert!(first.contains("- Feedback 1 (Score: 4/5): be exact"));
    }

    #[tokio::test]
    async fn test_concurrent_results_keep_input_order() {
        let provider = reversed_latency(5);
        let report = runner(5)
            .run(&provider, &credential(), &template("T"), &cases(5), &[])
            .await
            .unwrap();

        let inputs: Vec<&str> = report.results.iter().map(|r| r.input.as_str()).collect();
        assert_eq!(inputs, vec!["case-0", "case-1", "case-2", "case-3", "case-4"]);
        assert!(report.results.iter().all(|r| r.similarity_score == 100.0));
        assert_eq!(report.average, Some(100.0));
        assert!(provider.peak_concurrency() > 1);
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let provider = reversed_latency(6);
        runner(2)
            .run(&provider, &credential(), &template("T"), &cases(6), &[])
            .await
            .unwrap();
        assert!(provider.peak_concurrency() <= 2);
    }

    #[tokio::test]
    async fn test_provider_error_aborts_run() {
        let provider =
            ScriptedProvider::with_replies([Reply::text("answer number 0"), Reply::Fail(429)]);
        let err = runner(1)
            .run(&provider, &credential(), &template("T"), &cases(3), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GardenError::Transport { status: Some(429), .. }));
    }

    #[test]
    fn test_report_average() {
        let result = |score: f64| ValidationResult {
            input: String::new(),
            expected: String::new(),
            actual: String::new(),
            similarity_score: score,
        };
        let report = ValidationReport::from_results(vec![result(80.0), result(60.0)]);
        assert_eq!(report.average, Some(70.0));
    }
}
