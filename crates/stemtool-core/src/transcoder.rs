//! MP3 transcoding and pitch shifting using FFmpeg

use crate::error::{RunError, TranscodeError};
use crate::pitch::pitch_factor;
use crate::runner::{self, Artifact, ExpectedOutput, InvocationSpec, RetryPolicy};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg_path: PathBuf,
    bitrate: String,
    policy: RetryPolicy,
}

impl Transcoder {
    pub fn new(ffmpeg_path: PathBuf, bitrate: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            ffmpeg_path,
            bitrate: bitrate.into(),
            policy,
        }
    }

    /// Encode `input` to an MP3 at `output`, overwriting it
    pub async fn to_mp3(&self, input: &Path, output: &Path) -> Result<Artifact, TranscodeError> {
        info!("Encoding {} to MP3 ({})", input.display(), self.bitrate);
        ensure_input(input)?;

        let spec = self
            .spec(output)
            .arg("-i")
            .arg(input)
            .args(["-b:a", self.bitrate.as_str(), "-y"])
            .arg(output);
        Ok(runner::run(&spec).await.into_result()?)
    }

    /// Pitch-shift `input` by `semitones` into `<output_dir>/transposed_<n>.mp3`
    pub async fn transpose(
        &self,
        input: &Path,
        output_dir: &Path,
        semitones: i32,
    ) -> Result<Artifact, TranscodeError> {
        info!("Transposing {} by {} semitones", input.display(), semitones);
        ensure_input(input)?;

        let output = transposed_path(output_dir, semitones);
        let filter = format!("rubberband=pitch={}", pitch_factor(semitones));

        let spec = self
            .spec(&output)
            .arg("-i")
            .arg(input)
            .args(["-af", filter.as_str(), "-b:a", self.bitrate.as_str(), "-y"])
            .arg(&output);

        runner::run(&spec)
            .await
            .into_result()
            .map_err(|exhausted| match exhausted.last {
                RunError::NonZeroExit { ref stderr, .. } if rubberband_missing(stderr) => {
                    TranscodeError::RubberbandUnavailable(stderr.clone())
                }
                _ => TranscodeError::Exhausted(exhausted),
            })
    }

    fn spec(&self, output: &Path) -> InvocationSpec {
        InvocationSpec::new(&self.ffmpeg_path, ExpectedOutput::file(output))
            .args(["-hide_banner", "-loglevel", "error"])
            .policy(self.policy.clone())
    }
}

pub fn transposed_path(output_dir: &Path, semitones: i32) -> PathBuf {
    output_dir.join(format!("transposed_{}.mp3", semitones))
}

fn ensure_input(input: &Path) -> Result<(), TranscodeError> {
    if input.is_file() {
        Ok(())
    } else {
        Err(TranscodeError::InputNotFound(input.to_path_buf()))
    }
}

fn rubberband_missing(stderr: &str) -> bool {
    stderr.contains("No such filter: 'rubberband'") || stderr.contains("rubberband not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_transposed_path() {
        assert_eq!(
            transposed_path(Path::new("/tmp/t"), -3),
            PathBuf::from("/tmp/t/transposed_-3.mp3")
        );
    }

    #[test]
    fn test_rubberband_detection() {
        assert!(rubberband_missing(
            "[AVFilterGraph] No such filter: 'rubberband'\nError initializing filters"
        ));
        assert!(!rubberband_missing("Invalid data found when processing input"));
    }

    #[tokio::test]
    async fn test_missing_input_is_rejected_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Transcoder::new(
            PathBuf::from("ffmpeg"),
            "320k",
            RetryPolicy {
                timeout: Duration::from_secs(1),
                max_attempts: 1,
                retry_delay: Duration::ZERO,
                settle_delay: Duration::ZERO,
            },
        );

        let err = transcoder
            .transpose(&dir.path().join("missing.mp3"), dir.path(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::InputNotFound(_)));
    }
}
