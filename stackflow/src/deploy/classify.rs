//! Classification of change set failure reasons.
//!
//! The control plane reports an empty diff as a failed change set with a
//! natural-language reason. Matching that text is the only place the crate
//! interprets reason strings.

use serde::{Deserialize, Serialize};

/// Reason fragments the control plane uses for change sets with no changes.
pub const DEFAULT_NO_OP_PHRASES: &[&str] = &[
    "No updates are to be performed",
    "The submitted information didn't contain changes",
];

/// Decides whether a change set failure means "nothing to change".
///
/// Matches by substring against a list of known phrases. The list starts
/// with [`DEFAULT_NO_OP_PHRASES`] and can be extended with
/// [`NoOpClassifier::with_phrase`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoOpClassifier {
    phrases: Vec<String>,
}

impl Default for NoOpClassifier {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_NO_OP_PHRASES.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

impl NoOpClassifier {
    /// Creates a classifier with the default phrases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a phrase. Empty phrases are ignored since they match everything.
    #[must_use]
    pub fn with_phrase(mut self, phrase: impl Into<String>) -> Self {
        let phrase = phrase.into();
        if !phrase.is_empty() && !self.phrases.contains(&phrase) {
            self.phrases.push(phrase);
        }
        self
    }

    /// Returns the known phrases.
    #[must_use]
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Returns true if `reason` reports an empty change set.
    #[must_use]
    pub fn is_no_op(&self, reason: &str) -> bool {
        self.phrases.iter().any(|phrase| reason.contains(phrase.as_str()))
    }
}
