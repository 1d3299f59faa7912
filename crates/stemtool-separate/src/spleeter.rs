//! Spleeter 2-stem separation

use std::path::{Path, PathBuf};
use stemtool_core::runner::{ExpectedOutput, InvocationSpec, RetryPolicy};
use tracing::{debug, info, warn};

use crate::stem_name;

/// Spleeter runner (`spleeter separate -p spleeter:2stems`)
#[derive(Debug, Clone)]
pub struct Spleeter {
    spleeter_path: PathBuf,
}

impl Spleeter {
    pub fn new(spleeter_path: PathBuf) -> Self {
        Self { spleeter_path }
    }

    /// Spleeter writes into a folder named after the input file
    pub fn stems_dir(&self, output_dir: &Path, input: &Path) -> PathBuf {
        output_dir.join(stem_name(input))
    }

    pub fn invocation(&self, input: &Path, output_dir: &Path, policy: RetryPolicy) -> InvocationSpec {
        info!("Running Spleeter separation (2 stems)");

        let accompaniment = self.stems_dir(output_dir, input).join("accompaniment.wav");
        let expected = ExpectedOutput::discover(output_dir, move |_| {
            accompaniment.is_file().then(|| accompaniment.clone())
        });

        InvocationSpec::new(&self.spleeter_path, expected)
            .args(["separate", "-p", "spleeter:2stems", "-o"])
            .arg(output_dir)
            .arg(input)
            .policy(policy)
    }

    pub async fn cleanup(&self, output_dir: &Path, input: &Path) {
        let stems_dir = self.stems_dir(output_dir, input);
        match tokio::fs::remove_dir_all(&stems_dir).await {
            Ok(()) => debug!("Cleaned up Spleeter output subdirectory: {}", stems_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not clean up {}: {}", stems_dir.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_removes_stem_tree() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("original.mp3");
        std::fs::write(&input, b"mp3").unwrap();
        let spleeter = Spleeter::new(PathBuf::from("spleeter"));
        let stems = spleeter.stems_dir(dir.path(), &input);
        std::fs::create_dir_all(&stems).unwrap();
        std::fs::write(stems.join("accompaniment.wav"), b"a").unwrap();
        std::fs::write(stems.join("vocals.wav"), b"v").unwrap();

        spleeter.cleanup(dir.path(), &input).await;

        assert!(!stems.exists());
        assert!(input.exists());
    }
}
