use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::{
    ChatPrompt, GeneratorError, PostGenerator, RequestContext, decode_json, endpoint, http_client,
};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub model: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

/// Text generation through Gemini's `generateContent` endpoint.
#[derive(Debug)]
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    settings: GeminiSettings,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, settings: GeminiSettings) -> Result<Self, GeneratorError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GeneratorError::MissingApiKey { backend: "Gemini" });
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
        endpoint(
            &self.settings.base_url,
            &format!("models/{}:generateContent", self.settings.model),
        )
    }
}

impl PostGenerator for GeminiGenerator {
    fn complete(&self, _ctx: &RequestContext, prompt: &ChatPrompt) -> Result<String, GeneratorError> {
        let operation = prompt.operation;
        let body = GenerateContentRequest::new(prompt);

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|source| GeneratorError::Http { operation, source })?;

        let parsed: GenerateContentResponse = decode_json(operation, response)?;

        parsed
            .first_text()
            .ok_or(GeneratorError::EmptyResponse { operation })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> GenerateContentRequest<'a> {
    pub(crate) fn new(prompt: &'a ChatPrompt) -> Self {
        Self {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: &prompt.system,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &prompt.user }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    pub fn first_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();
        Some(text)
    }
}
