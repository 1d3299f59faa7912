//! Error types for source separation

use std::path::PathBuf;
use stemtool_core::error::{ConfigError, Exhausted, TranscodeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeparateError {
    #[error("Input file not found at {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Unknown separation engine: {0} (expected demucs or spleeter)")]
    UnknownEngine(String),

    #[error("{engine} separation failed: {source}")]
    Separation {
        engine: &'static str,
        #[source]
        source: Exhausted,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("FFmpeg conversion failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
