use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use postforge_config::{BackendKind, Config, load_or_init};
use postforge_llm::RequestContext;
use postforge_pipeline::{FixedPause, Pipeline, RunRequest};
use postforge_store::SavedPost;
use postforge_utils::has_text;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

mod backend;
mod logging;
mod progress;

use backend::BackendOptions;

/// postforge CLI entry point.
///
/// Turns a short post idea plus the business description in `about.md`
/// into a title, body and image prompt, saved under `posts/<business>/<NNNN>/`.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "postforge",
    author,
    version,
    about = "Generate a social-media post for your business from a short idea.",
    long_about = None
)]
struct Cli {
    /// Idea the post should be about.
    #[arg(value_name = "PREMISE")]
    premise: String,
    /// Language model backend to use instead of the configured one.
    #[arg(long, value_enum, value_name = "BACKEND")]
    backend: Option<BackendArg>,
    /// Model name passed to the backend.
    #[arg(long, value_name = "MODEL")]
    model: Option<String>,
    /// Seconds to wait between generation steps.
    #[arg(long = "delay-secs", value_name = "SECONDS")]
    delay_secs: Option<u64>,
    /// Business description file.
    #[arg(long, value_name = "PATH")]
    about: Option<PathBuf>,
    /// Directory that receives the generated posts.
    #[arg(long = "posts-dir", value_name = "PATH")]
    posts_dir: Option<PathBuf>,
    /// Do not echo tokens while a local model is generating.
    #[arg(long)]
    no_stream: bool,
    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Openai,
    Gemini,
    Ollama,
}

impl From<BackendArg> for BackendKind {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Openai => BackendKind::OpenAi,
            BackendArg::Gemini => BackendKind::Gemini,
            BackendArg::Ollama => BackendKind::Ollama,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let dotenv = dotenvy::dotenv();
    logging::init(cli.verbose);

    if let Ok(path) = dotenv {
        tracing::debug!("loaded environment from {}", path.display());
    }

    match execute(cli) {
        Ok(saved) => {
            println!("{}", saved.dir.display());
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<SavedPost> {
    ensure_premise(&cli.premise)?;
    let config = load_config();
    run(cli, config)
}

fn load_config() -> Config {
    match load_or_init() {
        Ok(outcome) => {
            if outcome.created {
                tracing::info!(
                    "created postforge configuration at {}",
                    outcome.path.display()
                );
            }
            outcome.config
        }
        Err(error) => {
            tracing::warn!("failed to load postforge configuration ({error}); falling back to defaults");
            Config::default()
        }
    }
}

/// Options after applying command-line overrides to the configuration.
#[derive(Debug, Clone)]
struct RunSettings {
    backend: BackendKind,
    step_delay: Duration,
    profile_path: PathBuf,
    posts_dir: PathBuf,
    backend_options: BackendOptions,
}

impl RunSettings {
    fn resolve(cli: &Cli, config: &Config) -> Self {
        Self {
            backend: cli.backend.map(BackendKind::from).unwrap_or(config.backend),
            step_delay: cli
                .delay_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.pipeline.step_delay()),
            profile_path: cli
                .about
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.pipeline.profile_file)),
            posts_dir: cli
                .posts_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.pipeline.posts_dir)),
            backend_options: BackendOptions::for_console(cli.model.clone(), !cli.no_stream),
        }
    }
}

fn run(cli: Cli, config: Config) -> Result<SavedPost> {
    let settings = RunSettings::resolve(&cli, &config);
    tracing::debug!(?settings, "resolved run settings");

    let generator = backend::build(settings.backend, &config, &settings.backend_options)?;
    let pipeline = Pipeline::new(generator, FixedPause::new(settings.step_delay));

    let request = RunRequest {
        profile_path: &settings.profile_path,
        posts_dir: &settings.posts_dir,
        premise: &cli.premise,
    };
    let saved = pipeline
        .run(&RequestContext::new(), &request)
        .context("post generation failed")?;

    tracing::info!(
        sequence = saved.sequence,
        "post written to {}",
        saved.dir.display()
    );
    Ok(saved)
}

fn ensure_premise(premise: &str) -> Result<()> {
    if !has_text(premise) {
        bail!("the post idea must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests;
