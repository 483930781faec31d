//! Provider request texts for the refinement loop.
//!
//! Each request is a Tera template rendered from plain view structs, so the
//! provider always receives the whole context in a single message.
//!
//! # Main Types
//! - `PromptLibrary`: renders improvement, synthesis and validation requests

use std::sync::Arc;

use serde::Serialize;
use tera::{Context, Tera};

use crate::config::TrainingConfig;
use crate::error::Result;
use crate::types::{Iteration, TestCase};

const IMPROVEMENT: &str = "improvement";
const SYNTHESIS: &str = "synthesis";
const VALIDATION: &str = "validation";

/// One iteration as it appears in a request, numbered from 1 in log order
#[derive(Debug, Clone, Serialize)]
struct IterationView<'a> {
    number: usize,
    prompt: &'a str,
    output: &'a str,
    feedback: &'a str,
    score: u8,
    prompt_summary: String,
    output_summary: String,
}

#[derive(Clone)]
pub struct PromptLibrary {
    tera: Arc<Tera>,
    prompt_summary_chars: usize,
    output_summary_words: usize,
    history_window: Option<usize>,
}

impl PromptLibrary {
    pub fn new(config: &TrainingConfig) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (IMPROVEMENT, IMPROVEMENT_TEMPLATE),
            (SYNTHESIS, SYNTHESIS_TEMPLATE),
            (VALIDATION, VALIDATION_TEMPLATE),
        ])?;
        Ok(Self {
            tera: Arc::new(tera),
            prompt_summary_chars: config.prompt_summary_chars,
            output_summary_words: config.output_summary_words,
            history_window: config.history_window,
        })
    }

    /// Ask for a revised output that addresses the latest feedback
    pub fn improvement(
        &self,
        prompt: &str,
        output: &str,
        feedback: &str,
        score: u8,
    ) -> Result<String> {
        let mut context = Context::new();
        context.insert("prompt", prompt);
        context.insert("output", output);
        context.insert("feedback", feedback);
        context.insert("score", &score);
        Ok(self.tera.render(IMPROVEMENT, &context)?)
    }

    /// Ask for a generalized template built from the iteration log
    pub fn synthesis(&self, iterations: &[Iteration]) -> Result<String> {
        let views = self.views(iterations);
        let rules: Vec<&str> = views.iter().map(|v| v.feedback).collect();

        let mut context = Context::new();
        context.insert("iterations", &views);
        context.insert("rules", &rules);
        Ok(self.tera.render(SYNTHESIS, &context)?)
    }

    /// Ask for a response to one held-out case, with the training history attached
    pub fn validation(
        &self,
        case: &TestCase,
        template: &str,
        iterations: &[Iteration],
    ) -> Result<String> {
        let mut context = Context::new();
        context.insert("case_prompt", &case.user_prompt);
        context.insert("case_expected", &case.expected_output);
        context.insert("template", template);
        context.insert("iterations", &self.views(iterations));
        Ok(self.tera.render(VALIDATION, &context)?)
    }

    /// Apply the history window, keeping the original numbering
    fn views<'a>(&self, iterations: &'a [Iteration]) -> Vec<IterationView<'a>> {
        let skip = match self.history_window {
            Some(window) => iterations.len().saturating_sub(window),
            None => 0,
        };
        iterations
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(index, iteration)| IterationView {
                number: index + 1,
                prompt: &iteration.prompt,
                output: &iteration.output,
                feedback: &iteration.feedback,
                score: iteration.score.value(),
                prompt_summary: summarize_prompt(&iteration.prompt, self.prompt_summary_chars),
                output_summary: summarize_output(&iteration.output, self.output_summary_words),
            })
            .collect()
    }
}

/// First `max_chars` characters, with an ellipsis when cut
pub fn summarize_prompt(prompt: &str, max_chars: usize) -> String {
    if prompt.chars().count() > max_chars {
        let head: String = prompt.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        prompt.to_string()
    }
}

/// First `max_words` whitespace-separated words, with an ellipsis when cut
pub fn summarize_output(output: &str, max_words: usize) -> String {
    let words: Vec<&str> = output.split_whitespace().collect();
    if words.len() > max_words {
        format!("{}...", words[..max_words].join(" "))
    } else {
        output.to_string()
    }
}

const IMPROVEMENT_TEMPLATE: &str = r#"Initial Prompt: {{ prompt }}
Generated Output: {{ output }}
User Feedback (Score {{ score }}/5): {{ feedback }}
Expected Quality Level: The output should be improved based on the feedback.

Please provide an improved version of the output that addresses the feedback."#;

const SYNTHESIS_TEMPLATE: &str = r#"Task: Create a generalized prompt template based on the following test cases and improvement rules.
{% for it in iterations %}
Test Case {{ it.number }}:
Initial Prompt: "{{ it.prompt }}"
Objective: "{{ it.prompt_summary }}"
Output Format: "{{ it.output_summary }}"
{% endfor %}
Requirements:
{% if rules -%}
{% for rule in rules -%}
- {{ rule }}
{% endfor -%}
{% else -%}
No improvement rules yet.
{% endif %}
Please generate a template that:
1. Extracts and generalizes the core objective from all test cases
2. Describes a flexible output format that can handle variations in expected outputs
3. Maintains all improvement rules as requirements
4. Structures the prompt in a clear, reusable format

Generate the template in this format:
Core Objective: [Generalized goal]
Output Format: [Abstract expected output format in words, not showing actual output]
Requirements: [List of requirements]"#;

const VALIDATION_TEMPLATE: &str = r#"Generate an appropriate response based on the following information:

Initial Prompt: "{{ case_prompt }}"
Expected Output Format: "{{ case_expected }}"

Prompt Template:
{{ template }}
{% if iterations %}
User Feedback History:
{% for it in iterations -%}
- Feedback {{ it.number }} (Score: {{ it.score }}/5): {{ it.feedback }}
{% endfor %}
Training Examples (Learn from these patterns):
{% for it in iterations %}
Example {{ it.number }}:
Initial Input: "{{ it.prompt }}"
Expected Output: "{{ it.output }}"
Feedback: "{{ it.feedback }}"
Score: {{ it.score }}/5
{% endfor %}{% endif %}
Your response should:
- Follow the format and style defined in the expected output
- Ensure consistent structure matching the expected output pattern
- Be precise and concise in the response
- Address all the feedback points from the User Feedback History
- Apply patterns learned from the training examples

Please generate a response that fulfills these requirements based on the initial prompt: "{{ case_prompt }}""#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Score;

    fn iteration(n: usize, score: i64) -> Iteration {
        Iteration {
            prompt: format!("prompt {}", n),
            output: format!("output {}", n),
            feedback: format!("feedback {}", n),
            score: Score::new(score),
        }
    }

    fn library() -> PromptLibrary {
        PromptLibrary::new(&TrainingConfig::default()).unwrap()
    }

    #[test]
    fn test_summaries() {
        assert_eq!(summarize_prompt("short", 100), "short");
        assert_eq!(summarize_prompt("abcdef", 3), "abc...");
        assert_eq!(summarize_prompt("héllo", 2), "hé...");

        assert_eq!(summarize_output("one two three", 3), "one two three");
        assert_eq!(summarize_output("one  two\nthree four", 2), "one two...");
    }

    #[test]
    fn test_improvement_request() {
        let text = library()
            .improvement("Write a haiku", "An old pond", "More imagery", 3)
            .unwrap();
        assert!(text.starts_with("Initial Prompt: Write a haiku\n"));
        assert!(text.contains("Generated Output: An old pond"));
        assert!(text.contains("User Feedback (Score 3/5): More imagery"));
        assert!(text.ends_with("addresses the feedback."));
    }

    #[test]
    fn test_synthesis_lists_cases_and_rules() {
        let text = library()
            .synthesis(&[iteration(1, 2), iteration(2, 4)])
            .unwrap();
        assert!(text.contains("Test Case 1:\nInitial Prompt: \"prompt 1\""));
        assert!(text.contains("Test Case 2:"));
        assert!(text.contains("Output Format: \"output 2\""));
        assert!(text.contains("- feedback 1\n- feedback 2\n"));
        assert!(!text.contains("No improvement rules yet."));
        assert!(text.contains("Core Objective: [Generalized goal]"));
    }

    #[test]
    fn test_synthesis_without_rules() {
        let text = library().synthesis(&[]).unwrap();
        assert!(text.contains("No improvement rules yet."));
    }

    #[test]
    fn test_synthesis_shortens_long_inputs() {
        let long_prompt = "x".repeat(150);
        let long_output = (0..30).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let iterations = vec![Iteration {
            prompt: long_prompt.clone(),
            output: long_output,
            feedback: "tighter".to_string(),
            score: Score::new(2),
        }];
        let text = library().synthesis(&iterations).unwrap();
        assert!(text.contains(&format!("Objective: \"{}...\"", "x".repeat(100))));
        assert!(text.contains("w19...\""));
        assert!(!text.contains("w20"));
    }

    #[test]
    fn test_validation_request() {
        let case = TestCase::new("sum 2 and 3", "5");
        let text = library()
            .validation(&case, "Core Objective: add numbers", &[iteration(1, 3)])
            .unwrap();
        assert!(text.contains("Initial Prompt: \"sum 2 and 3\""));
        assert!(text.contains("Expected Output Format: \"5\""));
        assert!(text.contains("Core Objective: add numbers"));
        assert!(text.contains("- Feedback 1 (Score: 3/5): feedback 1"));
        assert!(text.contains("Example 1:\nInitial Input: \"prompt 1\""));
        assert!(text.contains("Score: 3/5"));
    }

    #[test]
    fn test_validation_without_history() {
        let case = TestCase::new("p", "o");
        let text = library().validation(&case, "T", &[]).unwrap();
        assert!(!text.contains("User Feedback History:\n"));
        assert!(!text.contains("Training Examples (Learn"));
        assert!(text.contains("Prompt Template:\nT"));
    }

    #[test]
    fn test_history_window_keeps_numbering() {
        let config = TrainingConfig {
            history_window: Some(2),
            ..TrainingConfig::default()
        };
        let library = PromptLibrary::new(&config).unwrap();
        let iterations: Vec<Iteration> = (1..=4).map(|n| iteration(n, 2)).collect();

        let text = library.synthesis(&iterations).unwrap();
        assert!(!text.contains("Test Case 1:"));
        assert!(!text.contains("Test Case 2:"));
        assert!(text.contains("Test Case 3:"));
        assert!(text.contains("Test Case 4:"));
    }
}
