//! Core data model shared by every stage of the refinement loop.

use serde::{Deserialize, Serialize};

/// A (prompt, expected output) pair
///
/// Identity is positional: a case is addressed by its index within the set
/// that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub user_prompt: String,
    pub expected_output: String,
}

impl TestCase {
    pub fn new(user_prompt: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            expected_output: expected_output.into(),
        }
    }

    /// Both fields carry something other than whitespace
    pub fn is_complete(&self) -> bool {
        !self.user_prompt.trim().is_empty() && !self.expected_output.trim().is_empty()
    }
}

/// Feedback quality score, always within `1..=5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Clamp any integer into the valid range
    pub fn new(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// A top score accepts the current prompt as the template
    pub fn is_accepted(self) -> bool {
        self.0 == Self::MAX
    }
}

impl From<i64> for Score {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded cycle of (prompt, output, feedback, score)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iteration {
    pub prompt: String,
    pub output: String,
    pub feedback: String,
    pub score: Score,
}

/// Training and testing sets produced by a single import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSplit {
    pub training: Vec<TestCase>,
    pub testing: Vec<TestCase>,
}

impl CaseSplit {
    pub fn total(&self) -> usize {
        self.training.len() + self.testing.len()
    }
}

/// Where the live template came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    /// A score-5 iteration accepted the prompt verbatim
    Accepted,
    /// Generated by the provider from the iteration log
    Synthesized,
}

/// The generalized, reusable prompt
///
/// Only the most recent value is kept; regeneration replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizedTemplate {
    pub text: String,
    pub source: TemplateSource,
    /// Iteration count the template was derived from
    pub iterations: usize,
}

impl OptimizedTemplate {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl std::fmt::Display for OptimizedTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Outcome of running one held-out case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub input: String,
    pub expected: String,
    pub actual: String,
    /// 0..=100, two decimals
    pub similarity_score: f64,
}
