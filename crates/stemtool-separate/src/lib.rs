//! Source separation bridge for stemtool
//!
//! Splits a mixed track into vocals and accompaniment with an external engine
//! and keeps only the accompaniment, re-encoded as `instrumental.mp3`:
//! - Demucs: `htdemucs_ft` two-stem separation through Python
//! - Spleeter: the `spleeter:2stems` pretrained model

mod demucs;
mod error;
mod spleeter;

pub use demucs::Demucs;
pub use error::SeparateError;
pub use spleeter::Spleeter;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use stemtool_core::config::Config;
use stemtool_core::runner::{self, RetryPolicy};
use stemtool_core::transcoder::Transcoder;
use tracing::info;

/// File name of the separated accompaniment inside the output directory.
pub const INSTRUMENTAL_FILE_NAME: &str = "instrumental.mp3";

/// Separation engine selection
#[derive(Debug, Clone)]
pub enum SeparationEngine {
    Demucs(Demucs),
    Spleeter(Spleeter),
}

impl SeparationEngine {
    /// Build the engine named `name` with tool paths and model settings from `config`.
    pub fn from_config(name: &str, config: &Config) -> Result<Self, SeparateError> {
        match name.to_ascii_lowercase().as_str() {
            "demucs" => {
                let python = config.python_path()?;
                Ok(SeparationEngine::Demucs(Demucs::new(
                    python,
                    config.separate.model.clone(),
                    config.separate.device.clone(),
                )))
            }
            "spleeter" => {
                let spleeter = config.spleeter_path()?;
                Ok(SeparationEngine::Spleeter(Spleeter::new(spleeter)))
            }
            other => Err(SeparateError::UnknownEngine(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SeparationEngine::Demucs(_) => "Demucs",
            SeparationEngine::Spleeter(_) => "Spleeter",
        }
    }
}

impl std::fmt::Display for SeparationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Vocal remover: separation engine followed by MP3 encoding
#[derive(Debug)]
pub struct Separator {
    engine: SeparationEngine,
    transcoder: Transcoder,
    policy: RetryPolicy,
}

impl Separator {
    pub fn new(engine: SeparationEngine, transcoder: Transcoder, policy: RetryPolicy) -> Self {
        Self {
            engine,
            transcoder,
            policy,
        }
    }

    /// Write the accompaniment of `input` to `<output_dir>/instrumental.mp3`
    pub async fn separate(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, SeparateError> {
        let input = tokio::fs::canonicalize(input)
            .await
            .map_err(|_| SeparateError::InputNotFound(input.to_path_buf()))?;
        if !input.is_file() {
            return Err(SeparateError::InputNotFound(input));
        }

        tokio::fs::create_dir_all(output_dir).await?;
        let output_dir = tokio::fs::canonicalize(output_dir).await?;

        info!("Separating {} with {}", input.display(), self.engine);

        let spec = match &self.engine {
            SeparationEngine::Demucs(demucs) => {
                demucs.invocation(&input, &output_dir, self.policy.clone())
            }
            SeparationEngine::Spleeter(spleeter) => {
                spleeter.invocation(&input, &output_dir, self.policy.clone())
            }
        };

        let accompaniment = runner::run(&spec)
            .await
            .into_result()
            .map_err(|source| SeparateError::Separation {
                engine: self.engine.name(),
                source,
            })?;

        let instrumental = output_dir.join(INSTRUMENTAL_FILE_NAME);
        let encoded = self
            .transcoder
            .to_mp3(&accompaniment.filepath, &instrumental)
            .await;

        // Stems are intermediate whether or not the encode worked
        match &self.engine {
            SeparationEngine::Demucs(demucs) => demucs.cleanup(&output_dir, &input).await,
            SeparationEngine::Spleeter(spleeter) => spleeter.cleanup(&output_dir, &input).await,
        }

        let encoded = encoded?;
        info!("Successfully created instrumental MP3: {}", encoded.filepath.display());
        Ok(encoded.filepath)
    }
}

/// Input file name without its extension
pub(crate) fn stem_name(input: &Path) -> OsString {
    input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("input"))
}
