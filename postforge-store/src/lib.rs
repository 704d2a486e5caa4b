use postforge_utils::{business_dir_name, format_sequence, parse_sequence};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use postforge_utils::UNKNOWN_BUSINESS;

pub const POST_FILE_NAME: &str = "post.md";
pub const IMAGE_PROMPT_FILE_NAME: &str = "image_prompt.txt";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read business profile {path}")]
    ReadProfile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to list directory {path}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("directory name {name:?} in {path} is too large to be a post number")]
    SequenceOutOfRange { path: PathBuf, name: String },
    #[error("no post numbers left in {path}")]
    SequenceExhausted { path: PathBuf },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads the free-text business description.
pub fn load_profile(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|source| StoreError::ReadProfile {
        path: path.to_path_buf(),
        source,
    })
}

/// The generated pieces of a post, ready to be written.
#[derive(Debug, Clone, Copy)]
pub struct PostDraft<'a> {
    pub business_name: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub image_prompt: &'a str,
}

/// Where a post ended up on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPost {
    pub dir: PathBuf,
    pub sequence: u64,
}

impl SavedPost {
    pub fn post_path(&self) -> PathBuf {
        self.dir.join(POST_FILE_NAME)
    }

    pub fn image_prompt_path(&self) -> PathBuf {
        self.dir.join(IMAGE_PROMPT_FILE_NAME)
    }
}

pub fn render_post(title: &str, content: &str) -> String {
    format!("# {title}\n\n{content}")
}

/// Writes a post into the next numbered directory of its business.
///
/// The layout is `<posts_dir>/<business>/<NNNN>/{post.md,image_prompt.txt}`.
/// The numbered directory must not exist yet, so an earlier post is never
/// overwritten. Nothing is cleaned up on failure, so a half-written directory
/// can remain.
pub fn save_post(posts_dir: &Path, draft: &PostDraft<'_>) -> Result<SavedPost, StoreError> {
    let base_dir = posts_dir.join(business_dir_name(draft.business_name));
    create_dir_all(&base_dir)?;

    let sequence = next_sequence(&base_dir)?;
    let dir = base_dir.join(format_sequence(sequence));
    fs::create_dir(&dir).map_err(|source| StoreError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let saved = SavedPost { dir, sequence };
    write_file(&saved.post_path(), &render_post(draft.title, draft.content))?;
    write_file(&saved.image_prompt_path(), draft.image_prompt)?;

    tracing::info!(
        business = draft.business_name,
        path = %saved.dir.display(),
        "post saved"
    );
    Ok(saved)
}

/// One more than the largest numeric subdirectory name, or 1 when there is none.
///
/// Non-numeric names and plain files are ignored and gaps are never reused.
/// An all-digit name too large to count past is an error rather than skipped.
pub fn next_sequence(base_dir: &Path) -> Result<u64, StoreError> {
    let read_dir_error = |source| StoreError::ReadDir {
        path: base_dir.to_path_buf(),
        source,
    };

    let mut highest = 0;
    for entry in fs::read_dir(base_dir).map_err(read_dir_error)? {
        let entry = entry.map_err(read_dir_error)?;
        let is_dir = entry
            .file_type()
            .map(|file_type| file_type.is_dir())
            .map_err(read_dir_error)?;
        if !is_dir {
            continue;
        }

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let sequence = parse_sequence(name).map_err(|_| StoreError::SequenceOutOfRange {
            path: base_dir.to_path_buf(),
            name: name.to_string(),
        })?;
        if let Some(sequence) = sequence {
            highest = highest.max(sequence);
        }
    }

    highest
        .checked_add(1)
        .ok_or_else(|| StoreError::SequenceExhausted {
            path: base_dir.to_path_buf(),
        })
}

fn create_dir_all(path: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(path).map_err(|source| StoreError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), StoreError> {
    fs::write(path, contents).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}
