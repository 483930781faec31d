//! Garden core: an interactive prompt refinement and validation engine.
//!
//! A session imports (prompt, expected output) cases, refines a prompt from
//! human feedback until a top score accepts it, synthesizes a reusable
//! template from the feedback history, and scores that template against
//! held-out cases.

pub mod logger;

pub mod config;
pub mod engine;
pub mod error;
pub mod import;
pub mod llm;
pub mod output;
pub mod persistence;
pub mod session;
pub mod similarity;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use config::Config;
pub use engine::{EnginePhase, FeedbackResult, RefinementEngine, SynthesisStatus};
pub use error::{GardenError, Result};
pub use import::ImportFormat;
pub use llm::{ChatClient, CompletionProvider, Credential};
pub use session::{FeedbackOutcome, Session, SessionContext};
pub use types::{Iteration, OptimizedTemplate, Score, TestCase, ValidationResult};
pub use validation::{ValidationReport, ValidationRunner};
