//! Runs the post generation steps in their fixed order.
//!
//! `Start → ProfileLoaded → NameExtracted → PremiseRefined → TitleGenerated →
//! ContentGenerated → ImagePromptGenerated → Persisted → Done`, with any
//! failure ending the run in `Failed`. Nothing is written to disk until every
//! generation step has succeeded.

use std::fmt;
use std::path::Path;
use std::thread;
use std::time::Duration;

use postforge_llm::{GeneratorError, PostGenerator, RequestContext};
use postforge_store::{PostDraft, SavedPost, StoreError, load_profile, save_post};
use postforge_utils::{UNKNOWN_BUSINESS, has_text, trimmed_or_none};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Start,
    ProfileLoaded,
    NameExtracted,
    PremiseRefined,
    TitleGenerated,
    ContentGenerated,
    ImagePromptGenerated,
    Persisted,
    Done,
    Failed,
}

/// A unit of work moving the pipeline from one [`State`] to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadProfile,
    ExtractBusinessName,
    RefinePremise,
    GenerateTitle,
    GenerateContent,
    GenerateImagePrompt,
    SavePost,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoadProfile => "load business profile",
            Self::ExtractBusinessName => "extract business name",
            Self::RefinePremise => "refine premise",
            Self::GenerateTitle => "generate title",
            Self::GenerateContent => "generate content",
            Self::GenerateImagePrompt => "generate image prompt",
            Self::SavePost => "save post",
        }
    }

    /// State reached once this stage succeeds.
    pub fn reaches(self) -> State {
        match self {
            Self::LoadProfile => State::ProfileLoaded,
            Self::ExtractBusinessName => State::NameExtracted,
            Self::RefinePremise => State::PremiseRefined,
            Self::GenerateTitle => State::TitleGenerated,
            Self::GenerateContent => State::ContentGenerated,
            Self::GenerateImagePrompt => State::ImagePromptGenerated,
            Self::SavePost => State::Persisted,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("the post premise is empty")]
    EmptyPremise,
    #[error("stage '{stage}' failed")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::EmptyPremise => None,
            Self::Stage { stage, .. } => Some(*stage),
        }
    }
}

/// Wait policy applied between consecutive generator calls.
pub trait Pause {
    fn pause(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoPause;

impl Pause for NoPause {
    fn pause(&self) {}
}

/// Sleeps for a fixed duration, typically to stay under provider rate limits.
#[derive(Debug, Clone, Copy)]
pub struct FixedPause {
    duration: Duration,
}

impl FixedPause {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Pause for FixedPause {
    fn pause(&self) {
        if self.duration.is_zero() {
            return;
        }
        tracing::info!(
            "waiting {}s to avoid rate limiting",
            self.duration.as_secs_f32()
        );
        thread::sleep(self.duration);
    }
}

impl<P: Pause + ?Sized> Pause for Box<P> {
    fn pause(&self) {
        (**self).pause();
    }
}

/// Everything the generator produced for one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPost {
    pub business_name: String,
    pub refined_premise: String,
    pub title: String,
    pub content: String,
    pub image_prompt: String,
}

impl GeneratedPost {
    pub fn draft(&self) -> PostDraft<'_> {
        PostDraft {
            business_name: &self.business_name,
            title: &self.title,
            content: &self.content,
            image_prompt: &self.image_prompt,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub profile_path: &'a Path,
    pub posts_dir: &'a Path,
    pub premise: &'a str,
}

pub struct Pipeline<G, P = NoPause> {
    generator: G,
    pause: P,
}

impl<G: PostGenerator> Pipeline<G, NoPause> {
    pub fn without_pause(generator: G) -> Self {
        Self::new(generator, NoPause)
    }
}

impl<G: PostGenerator, P: Pause> Pipeline<G, P> {
    pub fn new(generator: G, pause: P) -> Self {
        Self { generator, pause }
    }

    /// Loads the profile, generates every part of the post and saves it.
    pub fn run(&self, ctx: &RequestContext, request: &RunRequest<'_>) -> Result<SavedPost, PipelineError> {
        ensure_premise(request.premise)?;
        tracing::debug!(state = ?State::Start, "pipeline started");

        let profile = step(Stage::LoadProfile, || load_profile(request.profile_path))?;
        let post = self.generate(ctx, &profile, request.premise)?;
        let saved = step(Stage::SavePost, || save_post(request.posts_dir, &post.draft()))?;

        tracing::debug!(state = ?State::Done, "pipeline finished");
        Ok(saved)
    }

    /// Runs the five generation steps, threading each output into the next.
    pub fn generate(
        &self,
        ctx: &RequestContext,
        profile: &str,
        premise: &str,
    ) -> Result<GeneratedPost, PipelineError> {
        ensure_premise(premise)?;
        let generator = &self.generator;

        tracing::info!("extracting business name");
        let business_name = step(Stage::ExtractBusinessName, || {
            generator.extract_business_name(ctx, profile)
        })?;
        let business_name = trimmed_or_none(Some(&business_name))
            .unwrap_or(UNKNOWN_BUSINESS)
            .to_string();
        tracing::info!(business = %business_name, "business name extracted");
        self.pause.pause();

        tracing::info!("refining post premise");
        let refined_premise = step(Stage::RefinePremise, || generator.refine_premise(ctx, premise))?;
        tracing::info!("refined premise: {refined_premise}");
        self.pause.pause();

        tracing::info!(business = %business_name, "generating post");
        let title = step(Stage::GenerateTitle, || {
            generator.generate_title(ctx, profile, &refined_premise)
        })?;
        tracing::info!("title: {title}");
        self.pause.pause();

        let content = step(Stage::GenerateContent, || {
            generator.generate_content(ctx, profile, &title)
        })?;
        tracing::debug!("content: {content}");
        self.pause.pause();

        let image_prompt = step(Stage::GenerateImagePrompt, || {
            generator.generate_image_prompt(ctx, profile, &title, &content)
        })?;
        tracing::debug!("image prompt: {image_prompt}");

        Ok(GeneratedPost {
            business_name,
            refined_premise,
            title,
            content,
            image_prompt,
        })
    }
}

fn ensure_premise(premise: &str) -> Result<(), PipelineError> {
    if has_text(premise) {
        Ok(())
    } else {
        Err(PipelineError::EmptyPremise)
    }
}

fn step<T, E, F>(stage: Stage, work: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, E>,
    E: Into<StageError>,
{
    match work() {
        Ok(value) => {
            tracing::debug!(state = ?stage.reaches(), "stage '{stage}' finished");
            Ok(value)
        }
        Err(error) => {
            tracing::debug!(state = ?State::Failed, "stage '{stage}' failed");
            Err(PipelineError::Stage {
                stage,
                source: error.into(),
            })
        }
    }
}
