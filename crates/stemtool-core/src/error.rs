//! Error types for stemtool-core

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a single attempt of an external command did not produce its artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("Timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Output file not found after run: {}", .expected.display())]
    MissingOutput { expected: PathBuf },

    #[error("Output file has zero size: {}", .path.display())]
    EmptyOutput { path: PathBuf },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl RunError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RunError::Timeout(_))
    }
}

/// The attempt budget ran out; carries the error of the final attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{last} (after {attempts} attempt(s))")]
pub struct Exhausted {
    pub last: RunError,
    pub attempts: u32,
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Invalid YouTube URL")]
    InvalidUrl(String),

    #[error(transparent)]
    Exhausted(#[from] Exhausted),
}

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error(
        "FFmpeg rubberband filter is not available. \
         Please ensure FFmpeg is compiled with --enable-librubberband. Original error: {0}"
    )]
    RubberbandUnavailable(String),

    #[error(transparent)]
    Exhausted(#[from] Exhausted),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}
