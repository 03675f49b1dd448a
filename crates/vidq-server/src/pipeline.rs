//! Question answering pipeline: translate, execute, normalize
//!
//! [`Analyst`] owns one translator and one executor, both injected. Every call
//! to [`Analyst::answer`] is independent; nothing is cached between questions.

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn, Level};
use vidq_duck::{ExecutionError, QueryError, QueryExecutor, UnsafeQueryError};
use vidq_nl::{LlmTranslator, OpenAiCompletion, RuleTranslator, Strategy, TranslationError, Translator};
use vidq_schema::SchemaDescriptor;

use crate::config::{Config, ConfigError, TranslatorConfig};
use crate::format::normalize;

/// Reply to an empty question
pub const EMPTY_QUESTION: &str = "Пожалуйста, задайте вопрос.";
pub const NOT_UNDERSTOOD: &str = "Не удалось понять вопрос. Попробуйте сформулировать его иначе.";
pub const REFUSED: &str = "Этот запрос нельзя выполнить.";
pub const UNAVAILABLE: &str = "Не удалось получить данные. Попробуйте позже.";

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("Translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("Unsafe query rejected: {0}")]
    UnsafeQuery(#[from] UnsafeQueryError),

    #[error("Execution failed: {0}")]
    Execution(#[from] ExecutionError),
}

impl From<QueryError> for AnswerError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Unsafe(e) => AnswerError::UnsafeQuery(e),
            QueryError::Execution(e) => AnswerError::Execution(e),
        }
    }
}

impl AnswerError {
    /// Short message safe to show a user
    pub fn user_message(&self) -> &'static str {
        match self {
            AnswerError::EmptyQuestion => EMPTY_QUESTION,
            AnswerError::Translation(_) => NOT_UNDERSTOOD,
            AnswerError::UnsafeQuery(_) => REFUSED,
            AnswerError::Execution(_) => UNAVAILABLE,
        }
    }
}

pub struct Analyst {
    translator: Arc<dyn Translator>,
    executor: QueryExecutor,
}

impl Analyst {
    pub fn new(translator: Arc<dyn Translator>, executor: QueryExecutor) -> Self {
        Self { translator, executor }
    }

    pub fn translator_name(&self) -> &'static str {
        self.translator.name()
    }

    /// Answer a question, surfacing the failing stage
    pub async fn try_answer(&self, question: &str) -> Result<String, AnswerError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AnswerError::EmptyQuestion);
        }

        let started = Instant::now();

        let query = self.translator.translate(question).await.map_err(|e| {
            warn!(question, translator = self.translator.name(), error = %e, "translation failed");
            AnswerError::from(e)
        })?;

        let raw = self.executor.execute(&query).await.map_err(|e| {
            let e = AnswerError::from(e);
            match &e {
                AnswerError::UnsafeQuery(reason) => {
                    error!(question, %query, reason = %reason, "rejected unsafe query")
                }
                other => error!(question, %query, error = %other, "query execution failed"),
            }
            e
        })?;

        let answer = normalize(&raw);
        crate::log_event!(
            level: Level::INFO,
            event: "answer_completed",
            translator: self.translator.name(),
            query: query,
            answer: answer,
            duration_ms: started.elapsed().as_millis()
        );
        Ok(answer)
    }

    /// Answer a question; failures become a short apology
    pub async fn answer(&self, question: &str) -> String {
        match self.try_answer(question).await {
            Ok(answer) => answer,
            Err(e) => e.user_message().to_string(),
        }
    }
}

/// Build the configured translator strategy
pub fn build_translator(
    config: &TranslatorConfig,
    schema: Arc<SchemaDescriptor>,
) -> Result<Arc<dyn Translator>, ConfigError> {
    let translator: Arc<dyn Translator> = match config.strategy()? {
        Strategy::Rules => Arc::new(RuleTranslator::new(schema).with_fallback(config.fallback)),
        Strategy::Llm => {
            let api_key = Config::get_openai_api_key()?;
            let client = OpenAiCompletion::new(api_key, config.api_base.as_deref(), config.model.clone());
            Arc::new(LlmTranslator::new(client, schema, config.timeout()))
        }
    };
    info!(strategy = translator.name(), "translator ready");
    Ok(translator)
}
