//! Demucs two-stem separation

use std::path::{Path, PathBuf};
use stemtool_core::runner::{ExpectedOutput, InvocationSpec, RetryPolicy};
use tracing::{debug, info, warn};

use crate::stem_name;

/// Demucs runner (`python -m demucs.separate`)
#[derive(Debug, Clone)]
pub struct Demucs {
    python_path: PathBuf,
    model: String,
    device: String,
}

impl Demucs {
    pub fn new(python_path: PathBuf, model: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            python_path,
            model: model.into(),
            device: device.into(),
        }
    }

    /// Where Demucs writes the stems of `input`: `<out>/<model>/<stem>/`
    pub fn stems_dir(&self, output_dir: &Path, input: &Path) -> PathBuf {
        output_dir.join(&self.model).join(stem_name(input))
    }

    pub fn invocation(&self, input: &Path, output_dir: &Path, policy: RetryPolicy) -> InvocationSpec {
        info!(
            "Running Demucs separation (model={}, device={})",
            self.model, self.device
        );

        let accompaniment = self.stems_dir(output_dir, input).join("no_vocals.wav");
        let expected = ExpectedOutput::discover(output_dir, move |_| {
            accompaniment.is_file().then(|| accompaniment.clone())
        });

        InvocationSpec::new(&self.python_path, expected)
            .args(["-m", "demucs.separate"])
            .args(["-n", self.model.as_str()])
            .args(["-d", self.device.as_str()])
            // vocals.wav + no_vocals.wav instead of four stems
            .args(["--two-stems", "vocals"])
            .arg("-o")
            .arg(output_dir)
            .arg(input)
            .policy(policy)
    }

    /// Remove the stem wavs and the directories Demucs created for them.
    pub async fn cleanup(&self, output_dir: &Path, input: &Path) {
        let stems_dir = self.stems_dir(output_dir, input);

        for name in ["vocals.wav", "no_vocals.wav"] {
            let path = stems_dir.join(name);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not remove {}: {}", path.display(), e);
                }
            }
        }

        if let Err(e) = tokio::fs::remove_dir(&stems_dir).await {
            warn!(
                "Could not fully clean up Demucs directories: {}: {}",
                stems_dir.display(),
                e
            );
            return;
        }

        // Shared with other tracks separated into the same directory
        let model_dir = output_dir.join(&self.model);
        if tokio::fs::remove_dir(&model_dir).await.is_ok() {
            debug!("Removed empty {}", model_dir.display());
        }
        debug!("Cleaned up Demucs output subdirectory: {}", stems_dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn demucs() -> Demucs {
        Demucs::new(PathBuf::from("python3"), "htdemucs_ft", "cpu")
    }

    #[test]
    fn test_stems_dir() {
        assert_eq!(
            demucs().stems_dir(Path::new("/tmp/track"), Path::new("/tmp/track/original.mp3")),
            PathBuf::from("/tmp/track/htdemucs_ft/original")
        );
    }

    #[test]
    fn test_invocation_discovers_in_output_dir() {
        let spec = demucs().invocation(
            Path::new("/in/song.mp3"),
            Path::new("/out"),
            RetryPolicy::default(),
        );
        assert_eq!(spec.expected().output_dir(), Some(Path::new("/out")));
    }

    #[tokio::test]
    async fn test_cleanup_removes_stems_and_empty_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("original.mp3");
        let stems = demucs().stems_dir(dir.path(), &input);
        std::fs::create_dir_all(&stems).unwrap();
        std::fs::write(stems.join("vocals.wav"), b"v").unwrap();
        std::fs::write(stems.join("no_vocals.wav"), b"a").unwrap();

        demucs().cleanup(dir.path(), &input).await;

        assert!(!stems.exists());
        assert!(!dir.path().join("htdemucs_ft").exists());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_model_dir_with_other_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.mp3");
        let stems = demucs().stems_dir(dir.path(), &input);
        std::fs::create_dir_all(&stems).unwrap();
        std::fs::create_dir_all(dir.path().join("htdemucs_ft/b")).unwrap();

        demucs().cleanup(dir.path(), &input).await;

        assert!(!stems.exists());
        assert!(dir.path().join("htdemucs_ft/b").exists());
    }

    #[test]
    fn test_stem_name_of_input_without_extension() {
        assert_eq!(stem_name(Path::new("/x/track")), OsString::from("track"));
    }
}
