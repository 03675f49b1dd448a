//! Natural language to SQL translation for the video analytics dataset
//!
//! Two interchangeable strategies sit behind the [`Translator`] trait:
//! - [`RuleTranslator`]: deterministic phrase matching driven by the schema descriptor
//! - [`LlmTranslator`]: delegates to a text-completion model
//!
//! Neither strategy is trusted to produce safe SQL; the executor re-checks
//! every query before it reaches storage.

use async_trait::async_trait;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub mod extract;
pub mod llm;
pub mod rules;

pub use llm::{strip_code_fences, CompletionClient, LlmTranslator, OpenAiCompletion};
pub use rules::RuleTranslator;

/// Query emitted when no intent rule matches and fallback is enabled
pub const FALLBACK_QUERY: &str = "SELECT COUNT(*) FROM videos";

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Question has no recognizable words")]
    Unrecognized,

    #[error("No intent rule matched the question")]
    NoIntent,

    #[error("Question is missing a required value: {0}")]
    MissingEntity(&'static str),

    #[error("Completion request failed: {0}")]
    Completion(String),

    #[error("Completion returned no query")]
    EmptyCompletion,

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),
}

/// Turns one question into one SQL query string
#[async_trait]
pub trait Translator: Send + Sync {
    /// Short strategy name for logs
    fn name(&self) -> &'static str;

    /// Never returns an empty string on success
    async fn translate(&self, question: &str) -> Result<String, TranslationError>;
}

/// Translator strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Rules,
    Llm,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rules" | "rule" | "rule-based" => Ok(Strategy::Rules),
            "llm" | "openai" => Ok(Strategy::Llm),
            other => Err(format!("unknown translator strategy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("rules".parse::<Strategy>().unwrap(), Strategy::Rules);
        assert_eq!(" LLM ".parse::<Strategy>().unwrap(), Strategy::Llm);
        assert!("magic".parse::<Strategy>().is_err());
    }
}
