#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{RequestFailure, RetryPolicy};
use crate::config::OpenRouterConfig;
use crate::{RagError, Result};

/// Fixed response returned when retrieval produced no context; no model call
/// is made in that case.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found.";

/// Client for the OpenRouter chat completions endpoint, used to produce
/// grounded answers from retrieved contexts.
#[derive(Debug, Clone)]
pub struct ChatClient {
    url: Url,
    api_key: String,
    model: String,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl ChatClient {
    #[inline]
    pub fn new(config: &OpenRouterConfig) -> Result<Self> {
        let url = config
            .api_url("chat/completions")
            .map_err(|e| RagError::Config(e.to_string()))?;
        let api_key = config
            .api_key()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.request_timeout()))
            .build()
            .into();

        Ok(Self {
            url,
            api_key,
            model: config.chat_model.clone(),
            agent,
            // Upstream LLM failures propagate without automatic retry
            retry: RetryPolicy::single_attempt(),
        })
    }

    /// Answer a question from retrieved contexts.
    ///
    /// With no contexts, returns the fixed no-information sentinel without
    /// calling the model. Otherwise the prompt restricts the model to the
    /// provided text and instructs it to say explicitly when the answer is
    /// absent.
    #[inline]
    pub fn generate_answer(
        &self,
        question: &str,
        contexts: &[String],
        sources: &[String],
    ) -> Result<String> {
        if contexts.is_empty() {
            debug!("No contexts retrieved, returning sentinel without model call");
            return Ok(NO_RELEVANT_INFORMATION.to_string());
        }

        let prompt = build_prompt(question, contexts, sources);
        self.complete(&prompt)
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let request_json = serde_json::to_string(&request)
            .map_err(|e| RagError::Llm(format!("Failed to serialize request: {}", e)))?;

        let response_text = self
            .retry
            .run(|| {
                self.agent
                    .post(self.url.as_str())
                    .header("Authorization", &format!("Bearer {}", self.api_key))
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .map_err(|failure: RequestFailure| RagError::Llm(failure.message()))?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Llm(format!("Failed to parse response: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RagError::Llm("Response contained no choices".to_string()))
    }
}

/// Build the grounded prompt: contexts labeled `[Chunk i]`, an optional
/// sources line, then the question.
pub(crate) fn build_prompt(question: &str, contexts: &[String], sources: &[String]) -> String {
    let context_text = contexts
        .iter()
        .enumerate()
        .map(|(i, context)| format!("[Chunk {}]\n{}", i + 1, context))
        .collect::<Vec<_>>()
        .join("\n\n");

    let source_info = if sources.is_empty() {
        String::new()
    } else {
        format!("\nSources: {}", sources.join(", "))
    };

    format!(
        "Answer the question using only the information below.\n\
         If the answer is not present, say so explicitly.\n\
         You may respond in any language.\n\
         \n\
         Documents:\n\
         {context_text}\n\
         {source_info}\n\
         \n\
         Question: {question}\n\
         \n\
         Answer:\n"
    )
}
