use anyhow::{Context, Result, bail};
use postforge_config::{BackendKind, Config};
use postforge_llm::{
    GeminiGenerator, GeminiSettings, OllamaGenerator, OllamaSettings, OpenAiGenerator,
    OpenAiSettings, PostGenerator,
};
use std::io::IsTerminal;

use crate::progress::Spinner;

#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    pub model: Option<String>,
    pub stream: bool,
    pub spinner: bool,
}

impl BackendOptions {
    pub fn for_console(model: Option<String>, stream: bool) -> Self {
        Self {
            model,
            stream,
            spinner: std::io::stderr().is_terminal(),
        }
    }
}

/// Builds the generator for the selected backend.
///
/// Credentials are checked here, before any request is made.
pub fn build(
    kind: BackendKind,
    config: &Config,
    options: &BackendOptions,
) -> Result<Box<dyn PostGenerator>> {
    let timeout = config.request_timeout();
    let model = postforge_utils::trimmed_or_none(options.model.as_deref());

    let generator: Box<dyn PostGenerator> = match kind {
        BackendKind::OpenAi => {
            let env_var = &config.openai.api_key_env_var;
            let Some(api_key) = config.openai.api_key_from_env() else {
                bail!("environment variable {env_var} is not set; it must hold the OpenAI API key");
            };
            let settings = OpenAiSettings {
                model: model.unwrap_or(&config.openai.model).to_string(),
                base_url: config.openai.base_url.clone(),
                timeout,
            };
            let generator =
                OpenAiGenerator::new(api_key, settings).context("failed to set up OpenAI backend")?;
            tracing::info!(model = generator.model(), "using OpenAI backend");
            with_spinner(generator, options.spinner)
        }
        BackendKind::Gemini => {
            let env_var = &config.gemini.api_key_env_var;
            let Some(api_key) = config.gemini.api_key_from_env() else {
                bail!("environment variable {env_var} is not set; it must hold the Gemini API key");
            };
            let settings = GeminiSettings {
                model: model.unwrap_or(&config.gemini.model).to_string(),
                base_url: config.gemini.base_url.clone(),
                timeout,
            };
            let generator =
                GeminiGenerator::new(api_key, settings).context("failed to set up Gemini backend")?;
            tracing::info!(model = generator.model(), "using Gemini backend");
            with_spinner(generator, options.spinner)
        }
        BackendKind::Ollama => {
            let mut settings = OllamaSettings::from_environment(
                model.or(Some(config.ollama.model.as_str())),
                Some(config.ollama.host.as_str()),
            );
            settings.timeout = timeout;
            let mut generator =
                OllamaGenerator::new(settings).context("failed to set up Ollama backend")?;
            if !options.stream {
                generator = generator.with_sink(None);
            }
            tracing::info!(
                model = generator.model(),
                host = generator.host(),
                "using Ollama backend"
            );
            Box::new(generator)
        }
    };

    Ok(generator)
}

fn with_spinner<G: PostGenerator + 'static>(generator: G, spinner: bool) -> Box<dyn PostGenerator> {
    if spinner {
        Box::new(Spinner::new(generator))
    } else {
        Box::new(generator)
    }
}
