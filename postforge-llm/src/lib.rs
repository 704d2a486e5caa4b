use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

mod gemini;
mod ollama;
mod openai;
pub mod prompts;

pub use gemini::{GeminiGenerator, GeminiSettings};
pub use ollama::{
    ConsoleSink, DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_PORT, OllamaGenerator, OllamaSettings,
    TokenSink, resolve_host,
};
pub use openai::{OpenAiGenerator, OpenAiSettings};
pub use prompts::ChatPrompt;

/// The five generation steps of a post, used to label requests and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ExtractBusinessName,
    RefinePremise,
    GenerateTitle,
    GenerateContent,
    GenerateImagePrompt,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExtractBusinessName => "extract business name",
            Self::RefinePremise => "refine premise",
            Self::GenerateTitle => "generate title",
            Self::GenerateContent => "generate content",
            Self::GenerateImagePrompt => "generate image prompt",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("{backend} API key is missing")]
    MissingApiKey { backend: &'static str },
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("{operation}: input text is empty")]
    EmptyInput { operation: Operation },
    #[error("{operation}: request was cancelled")]
    Cancelled { operation: Operation },
    #[error("{operation}: the model returned an empty response")]
    EmptyResponse { operation: Operation },
    #[error("{operation}: request failed")]
    Http {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation}: failed to read response stream")]
    Stream {
        operation: Operation,
        #[source]
        source: std::io::Error,
    },
    #[error("{operation}: malformed response")]
    Decode {
        operation: Operation,
        #[source]
        source: serde_json::Error,
    },
    #[error("{operation}: backend reported an error: {message}")]
    Backend { operation: Operation, message: String },
}

/// Cancellation handle passed to every generator call.
///
/// Clones share the same flag, so cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancelled: Arc<AtomicBool>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn ensure_active(&self, operation: Operation) -> Result<(), GeneratorError> {
        if self.is_cancelled() {
            Err(GeneratorError::Cancelled { operation })
        } else {
            Ok(())
        }
    }
}

/// A text-completion backend able to produce every part of a post.
///
/// Backends only implement [`PostGenerator::complete`]; the five post
/// operations are provided on top of it. Overrides of the provided operations
/// are honoured through `Box<G>` and `&G` as well.
pub trait PostGenerator: Send + Sync {
    /// Sends one system/user exchange and returns the first candidate's raw text.
    fn complete(&self, ctx: &RequestContext, prompt: &ChatPrompt) -> Result<String, GeneratorError>;

    fn extract_business_name(
        &self,
        ctx: &RequestContext,
        profile: &str,
    ) -> Result<String, GeneratorError> {
        let prompt = prompts::extract_business_name(profile)?;
        self.run_prompt(ctx, &prompt)
    }

    fn refine_premise(&self, ctx: &RequestContext, premise: &str) -> Result<String, GeneratorError> {
        let prompt = prompts::refine_premise(premise)?;
        self.run_prompt(ctx, &prompt)
    }

    fn generate_title(
        &self,
        ctx: &RequestContext,
        profile: &str,
        premise: &str,
    ) -> Result<String, GeneratorError> {
        let prompt = prompts::generate_title(profile, premise)?;
        self.run_prompt(ctx, &prompt)
    }

    fn generate_content(
        &self,
        ctx: &RequestContext,
        profile: &str,
        title: &str,
    ) -> Result<String, GeneratorError> {
        let prompt = prompts::generate_content(profile, title)?;
        self.run_prompt(ctx, &prompt)
    }

    fn generate_image_prompt(
        &self,
        ctx: &RequestContext,
        profile: &str,
        title: &str,
        content: &str,
    ) -> Result<String, GeneratorError> {
        let prompt = prompts::generate_image_prompt(profile, title, content)?;
        self.run_prompt(ctx, &prompt)
    }

    fn run_prompt(&self, ctx: &RequestContext, prompt: &ChatPrompt) -> Result<String, GeneratorError> {
        ctx.ensure_active(prompt.operation)?;
        tracing::debug!(operation = %prompt.operation, "sending completion request");
        let text = self.complete(ctx, prompt)?;
        Ok(text.trim().to_string())
    }
}

impl<G: PostGenerator + ?Sized> PostGenerator for Box<G> {
    fn complete(&self, ctx: &RequestContext, prompt: &ChatPrompt) -> Result<String, GeneratorError> {
        (**self).complete(ctx, prompt)
    }

    fn extract_business_name(
        &self,
        ctx: &RequestContext,
        profile: &str,
    ) -> Result<String, GeneratorError> {
        (**self).extract_business_name(ctx, profile)
    }

    fn refine_premise(&self, ctx: &RequestContext, premise: &str) -> Result<String, GeneratorError> {
        (**self).refine_premise(ctx, premise)
    }

    fn generate_title(
        &self,
        ctx: &RequestContext,
        profile: &str,
        premise: &str,
    ) -> Result<String, GeneratorError> {
        (**self).generate_title(ctx, profile, premise)
    }

    fn generate_content(
        &self,
        ctx: &RequestContext,
        profile: &str,
        title: &str,
    ) -> Result<String, GeneratorError> {
        (**self).generate_content(ctx, profile, title)
    }

    fn generate_image_prompt(
        &self,
        ctx: &RequestContext,
        profile: &str,
        title: &str,
        content: &str,
    ) -> Result<String, GeneratorError> {
        (**self).generate_image_prompt(ctx, profile, title, content)
    }

    fn run_prompt(&self, ctx: &RequestContext, prompt: &ChatPrompt) -> Result<String, GeneratorError> {
        (**self).run_prompt(ctx, prompt)
    }
}

impl<G: PostGenerator + ?Sized> PostGenerator for &G {
    fn complete(&self, ctx: &RequestContext, prompt: &ChatPrompt) -> Result<String, GeneratorError> {
        (**self).complete(ctx, prompt)
    }

    fn extract_business_name(
        &self,
        ctx: &RequestContext,
        profile: &str,
    ) -> Result<String, GeneratorError> {
        (**self).extract_business_name(ctx, profile)
    }

    fn refine_premise(&self, ctx: &RequestContext, premise: &str) -> Result<String, GeneratorError> {
        (**self).refine_premise(ctx, premise)
    }

    fn generate_title(
        &self,
        ctx: &RequestContext,
        profile: &str,
        premise: &str,
    ) -> Result<String, GeneratorError> {
        (**self).generate_title(ctx, profile, premise)
    }

    fn generate_content(
        &self,
        ctx: &RequestContext,
        profile: &str,
        title: &str,
    ) -> Result<String, GeneratorError> {
        (**self).generate_content(ctx, profile, title)
    }

    fn generate_image_prompt(
        &self,
        ctx: &RequestContext,
        profile: &str,
        title: &str,
        content: &str,
    ) -> Result<String, GeneratorError> {
        (**self).generate_image_prompt(ctx, profile, title, content)
    }

    fn run_prompt(&self, ctx: &RequestContext, prompt: &ChatPrompt) -> Result<String, GeneratorError> {
        (**self).run_prompt(ctx, prompt)
    }
}

fn http_client(timeout: Option<Duration>) -> Result<Client, GeneratorError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(GeneratorError::Client)
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Decodes a JSON reply, surfacing the provider's `error.message` on non-2xx.
fn decode_json<T: DeserializeOwned>(
    operation: Operation,
    response: Response,
) -> Result<T, GeneratorError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|source| GeneratorError::Http { operation, source })?;

    if !status.is_success() {
        let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => format!("{} (HTTP status {status})", envelope.error.message),
            Err(_) => format!("HTTP status {status}"),
        };
        return Err(GeneratorError::Backend { operation, message });
    }

    serde_json::from_str(&body).map_err(|source| GeneratorError::Decode { operation, source })
}
