//! LLM-backed translator
//!
//! Sends the schema descriptor as the system instruction and the raw question
//! as user content, then cleans the completion down to a bare query.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use vidq_schema::SchemaDescriptor;

use crate::{TranslationError, Translator};

/// Text-completion collaborator
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, TranslationError>;
}

/// OpenAI-compatible chat completion endpoint
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(api_key: impl Into<String>, api_base: Option<&str>, model: impl Into<String>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key.into());
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletion {
    async fn complete(&self, system: &str, user: &str) -> Result<String, TranslationError> {
        let completion_err = |e: async_openai::error::OpenAIError| TranslationError::Completion(e.to_string());

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(completion_err)?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()
                    .map_err(completion_err)?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(messages)
            .temperature(0.0) // Deterministic output
            .build()
            .map_err(completion_err)?;

        let response = self.client.chat().create(request).await.map_err(completion_err)?;

        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default())
    }
}

/// Remove markdown code fences around a completion
pub fn strip_code_fences(content: &str) -> String {
    content
        .replace("```sql", "")
        .replace("```SQL", "")
        .replace("```", "")
        .trim()
        .to_string()
}

pub struct LlmTranslator<C> {
    client: C,
    system_prompt: String,
    timeout: Duration,
}

impl<C: CompletionClient> LlmTranslator<C> {
    pub fn new(client: C, schema: Arc<SchemaDescriptor>, timeout: Duration) -> Self {
        Self {
            client,
            system_prompt: schema.render_prompt(),
            timeout,
        }
    }
}

#[async_trait]
impl<C: CompletionClient> Translator for LlmTranslator<C> {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn translate(&self, question: &str) -> Result<String, TranslationError> {
        let user = format!("Вход: {}", question.trim());

        let content = tokio::time::timeout(self.timeout, self.client.complete(&self.system_prompt, &user))
            .await
            .map_err(|_| TranslationError::Timeout(self.timeout))??;

        let sql = strip_code_fences(&content);
        if sql.is_empty() {
            warn!(question, "completion returned no query");
            return Err(TranslationError::EmptyCompletion);
        }

        info!(question, %sql, "LLM translation");
        Ok(sql)
    }
}
