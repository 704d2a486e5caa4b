use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::{
    ChatPrompt, GeneratorError, PostGenerator, RequestContext, decode_json, endpoint, http_client,
};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub model: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

/// Chat-completions client for the OpenAI API.
#[derive(Debug)]
pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
    settings: OpenAiSettings,
}

impl OpenAiGenerator {
    /// # Errors
    ///
    /// Returns [`GeneratorError::MissingApiKey`] when the key is empty or
    /// whitespace only.
    pub fn new(api_key: impl Into<String>, settings: OpenAiSettings) -> Result<Self, GeneratorError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GeneratorError::MissingApiKey { backend: "OpenAI" });
        }

        Ok(Self {
            client: http_client(settings.timeout)?,
            api_key,
            settings,
        })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub(crate) fn url(&self) -> String {
        endpoint(&self.settings.base_url, "chat/completions")
    }
}

impl PostGenerator for OpenAiGenerator {
    fn complete(&self, _ctx: &RequestContext, prompt: &ChatPrompt) -> Result<String, GeneratorError> {
        let operation = prompt.operation;
        let body = ChatRequest::new(&self.settings.model, prompt);

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|source| GeneratorError::Http { operation, source })?;

        let parsed: ChatResponse = decode_json(operation, response)?;

        parsed
            .first_text()
            .ok_or(GeneratorError::EmptyResponse { operation })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatRequest<'a> {
    pub(crate) fn new(model: &'a str, prompt: &'a ChatPrompt) -> Self {
        Self {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice; a `null` content counts as empty text.
    pub fn first_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
    }
}
