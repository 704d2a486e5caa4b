use std::io::{self, BufRead, BufReader, Write};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::{
    ChatPrompt, GeneratorError, Operation, PostGenerator, RequestContext, endpoint, http_client,
};

pub const DEFAULT_MODEL: &str = "qwen3:4b";
pub const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;
pub const OLLAMA_HOST_ENV_VAR: &str = "OLLAMA_HOST";

/// Receives generated text as it streams in.
pub trait TokenSink: Send + Sync {
    fn token(&self, text: &str);

    /// Called once the stream has ended, and also after a failure that
    /// interrupted tokens already echoed.
    fn finish(&self) {}
}

/// Echoes streamed tokens to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl TokenSink for ConsoleSink {
    fn token(&self, text: &str) {
        let mut stderr = io::stderr().lock();
        let _ = stderr.write_all(text.as_bytes());
        let _ = stderr.flush();
    }

    fn finish(&self) {
        eprintln!();
    }
}

#[derive(Debug, Clone)]
pub struct OllamaSettings {
    pub model: String,
    /// Base URL of the Ollama server, see [`resolve_host`].
    pub host: String,
    pub timeout: Option<Duration>,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            host: DEFAULT_OLLAMA_HOST.to_string(),
            timeout: None,
        }
    }
}

impl OllamaSettings {
    /// Builds settings from the configured model and host, consulting
    /// `OLLAMA_HOST` when no host is configured.
    pub fn from_environment(model: Option<&str>, host: Option<&str>) -> Self {
        let env_host = std::env::var(OLLAMA_HOST_ENV_VAR).ok();
        Self {
            model: postforge_utils::trimmed_or_none(model)
                .unwrap_or(DEFAULT_MODEL)
                .to_string(),
            host: resolve_host(host, env_host.as_deref()),
            timeout: None,
        }
    }
}

/// Chat client for a locally running Ollama server.
///
/// Responses are requested as a stream with thinking disabled; every chunk
/// is handed to the token sink and accumulated into the returned text.
pub struct OllamaGenerator {
    client: Client,
    settings: OllamaSettings,
    sink: Option<Box<dyn TokenSink>>,
}

impl OllamaGenerator {
    pub fn new(settings: OllamaSettings) -> Result<Self, GeneratorError> {
        Ok(Self {
            client: http_client(settings.timeout)?,
            settings,
            sink: Some(Box::new(ConsoleSink)),
        })
    }

    pub fn with_sink(mut self, sink: Option<Box<dyn TokenSink>>) -> Self {
        self.sink = sink;
        self
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn host(&self) -> &str {
        &self.settings.host
    }

    pub(crate) fn url(&self) -> String {
        endpoint(&self.settings.host, "api/chat")
    }

    fn read_stream<R: BufRead>(
        &self,
        ctx: &RequestContext,
        operation: Operation,
        reader: R,
    ) -> Result<String, GeneratorError> {
        let mut text = String::new();
        let result = self.collect_stream(ctx, operation, reader, &mut text);

        if let Some(sink) = &self.sink {
            if result.is_ok() || !text.is_empty() {
                sink.finish();
            }
        }
        result.map(|()| text)
    }

    fn collect_stream<R: BufRead>(
        &self,
        ctx: &RequestContext,
        operation: Operation,
        reader: R,
        text: &mut String,
    ) -> Result<(), GeneratorError> {
        let mut received = false;

        for line in reader.lines() {
            ctx.ensure_active(operation)?;
            let line = line.map_err(|source| GeneratorError::Stream { operation, source })?;
            if line.trim().is_empty() {
                continue;
            }

            let chunk: ChatChunk = serde_json::from_str(&line)
                .map_err(|source| GeneratorError::Decode { operation, source })?;

            if let Some(message) = chunk.error {
                return Err(GeneratorError::Backend { operation, message });
            }

            if let Some(message) = chunk.message {
                received = true;
                if !message.content.is_empty() {
                    if let Some(sink) = &self.sink {
                        sink.token(&message.content);
                    }
                    text.push_str(&message.content);
                }
            }

            if chunk.done {
                break;
            }
        }

        if received {
            Ok(())
        } else {
            Err(GeneratorError::EmptyResponse { operation })
        }
    }
}

impl std::fmt::Debug for OllamaGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaGenerator")
            .field("settings", &self.settings)
            .field("streams_to_sink", &self.sink.is_some())
            .finish()
    }
}

impl PostGenerator for OllamaGenerator {
    fn complete(&self, ctx: &RequestContext, prompt: &ChatPrompt) -> Result<String, GeneratorError> {
        let operation = prompt.operation;
        let body = ChatRequest::new(&self.settings.model, prompt);

        let response = self
            .client
            .post(self.url())
            .json(&body)
            .send()
            .map_err(|source| GeneratorError::Http { operation, source })?;

        let status = response.status();
        if !status.is_success() {
            // Ollama explains failures such as unknown models in a JSON body.
            let reported = response
                .text()
                .ok()
                .and_then(|body| serde_json::from_str::<ChatChunk>(&body).ok())
                .and_then(|chunk| chunk.error);
            return Err(GeneratorError::Backend {
                operation,
                message: reported.unwrap_or_else(|| format!("HTTP status {status}")),
            });
        }

        self.read_stream(ctx, operation, BufReader::new(response))
    }
}

/// Resolves the server base URL from the configured host or `OLLAMA_HOST`.
///
/// A value without scheme is treated as `http` and gets port 11434 when it
/// carries none; a value with an explicit scheme is used as given.
pub fn resolve_host(configured: Option<&str>, env: Option<&str>) -> String {
    let raw = postforge_utils::trimmed_or_none(configured)
        .or_else(|| postforge_utils::trimmed_or_none(env));
    let Some(raw) = raw else {
        return DEFAULT_OLLAMA_HOST.to_string();
    };
    let raw = raw.trim_end_matches('/');

    if raw.contains("://") {
        return raw.to_string();
    }

    let (authority, path) = match raw.split_once('/') {
        Some((authority, path)) => (authority, Some(path)),
        None => (raw, None),
    };
    let has_port = match authority.rsplit_once(':') {
        Some((host, port)) => !port.is_empty() && (!host.contains(':') || host.ends_with(']')),
        None => false,
    };

    let mut url = if authority.is_empty() {
        format!("http://127.0.0.1:{DEFAULT_OLLAMA_PORT}")
    } else if has_port {
        format!("http://{authority}")
    } else {
        format!("http://{authority}:{DEFAULT_OLLAMA_PORT}")
    };
    if let Some(path) = path {
        url.push('/');
        url.push_str(path);
    }
    url
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    think: bool,
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
            stream: true,
            think: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}
