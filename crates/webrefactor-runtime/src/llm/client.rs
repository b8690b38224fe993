//! Provider-agnostic model client.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use webrefactor_protocols::page::PageSummary;
use webrefactor_protocols::{
    ChatMessage, CompletionRequest, LLMProvider, ProviderError, RetryContext,
};

use super::log::ExchangeLog;
use super::prompt;

pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Builds prompts, calls the provider and returns the raw assistant text.
/// Parsing is left to the caller.
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: Option<u32>,
    temperature: f32,
    log: Option<ExchangeLog>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            model: String::new(),
            max_tokens: None,
            temperature: DEFAULT_TEMPERATURE,
            log: None,
        }
    }

    /// Model name; empty means the provider's default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_exchange_log(mut self, log: ExchangeLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    /// Ask for a command batch, in retry mode when `retry` is given.
    pub async fn generate(
        &self,
        summary: &PageSummary,
        user_prompt: &str,
        retry: Option<&RetryContext>,
    ) -> Result<String, ProviderError> {
        let messages = prompt::build_messages(summary, user_prompt, retry);
        if let Some(ctx) = retry {
            info!(
                attempt = ctx.attempt + 1,
                failed = ctx.failed_commands.len(),
                blocked = ctx.blocked_selectors.len(),
                "Requesting retry batch"
            );
        }
        self.complete(messages, if retry.is_some() { "retry" } else { "refactor" })
            .await
    }

    /// Send a trivial message and return the reply.
    pub async fn test_connection(&self) -> Result<String, ProviderError> {
        self.complete(
            vec![ChatMessage::user(prompt::CONNECTION_TEST_MESSAGE)],
            "connection_test",
        )
        .await
    }

    async fn complete(&self, messages: Vec<ChatMessage>, purpose: &str) -> Result<String, ProviderError> {
        let mut request = CompletionRequest::new(self.model.clone(), messages)
            .with_temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        if let Some(log) = &self.log {
            log.record(
                "request",
                json!({
                    "purpose": purpose,
                    "provider": self.provider.id(),
                    "model": request.model,
                    "messages": request.messages,
                }),
            )
            .await;
        }

        debug!(
            provider = self.provider.id(),
            model = %request.model,
            messages = request.messages.len(),
            purpose,
            "Calling LLM"
        );

        match self.provider.complete(request).await {
            Ok(response) => {
                debug!(model = %response.model, len = response.text.len(), "LLM replied");
                if let Some(log) = &self.log {
                    log.record(
                        "response",
                        json!({"purpose": purpose, "model": response.model, "text": response.text}),
                    )
                    .await;
                }
                Ok(response.text)
            }
            Err(e) => {
                warn!(provider = self.provider.id(), error = %e, "LLM call failed");
                if let Some(log) = &self.log {
                    log.record("error", json!({"purpose": purpose, "error": e.to_string()}))
                        .await;
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
