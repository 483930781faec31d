//! Provider seam

use crate::error::Result;

/// Access credential for the model provider
///
/// Never printed: `Debug` redacts the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Blank values are treated as absent
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// One prompt in, one completion out
///
/// Implementations hold no conversation state: everything the model needs
/// must be embedded in `prompt` on every call. Failures surface as
/// [`crate::error::GardenError::Transport`].
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, credential: &Credential) -> Result<String>;
}
