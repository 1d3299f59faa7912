//! JSON result envelope written to stdout by every command

use crate::runner::{Artifact, InvocationResult};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

/// `{"success": true, "filepath": ...}` or `{"success": false, "error": ...}`.
///
/// Constructors guarantee that a successful envelope carries a filepath and no
/// error, and a failed one carries an error and nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semitones: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn success(filepath: impl Into<PathBuf>) -> Self {
        Self {
            success: true,
            video_id: None,
            title: None,
            artist: None,
            filepath: Some(filepath.into()),
            duration: None,
            semitones: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            video_id: None,
            title: None,
            artist: None,
            filepath: None,
            duration: None,
            semitones: None,
            error: Some(error.into()),
        }
    }

    pub fn with_video(mut self, video_id: &str, title: &str, artist: &str) -> Self {
        if self.success {
            self.video_id = Some(video_id.to_string());
            self.title = Some(title.to_string());
            self.artist = Some(artist.to_string());
        }
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        if self.success {
            self.duration = Some(duration);
        }
        self
    }

    pub fn with_semitones(mut self, semitones: i32) -> Self {
        if self.success {
            self.semitones = Some(semitones);
        }
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            // Only reachable with a non-UTF-8 path; keep stdout well-formed.
            serde_json::json!({
                "success": false,
                "error": format!("Failed to serialize result to JSON: {e}"),
            })
            .to_string()
        })
    }

    /// Write the envelope as a single line on stdout.
    pub fn emit(&self) -> std::io::Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", self.to_json())?;
        stdout.flush()
    }
}

impl From<&Artifact> for Envelope {
    fn from(artifact: &Artifact) -> Self {
        Envelope::success(artifact.filepath.clone())
    }
}

impl From<InvocationResult> for Envelope {
    fn from(result: InvocationResult) -> Self {
        match result {
            InvocationResult::Success(artifact) => Envelope::from(&artifact),
            InvocationResult::Failure(exhausted) => Envelope::failure(exhausted.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Exhausted, RunError};
    use serde_json::Value;

    #[test]
    fn test_download_success_shape() {
        let env = Envelope::success("/tmp/abc/original.mp3")
            .with_video("dQw4w9WgXcQ", "Song", "Channel")
            .with_duration(0.0);
        let v: Value = serde_json::from_str(&env.to_json()).unwrap();

        assert_eq!(v["success"], true);
        assert_eq!(v["videoId"], "dQw4w9WgXcQ");
        assert_eq!(v["filepath"], "/tmp/abc/original.mp3");
        assert_eq!(v["duration"], 0.0);
        assert!(v.get("error").is_none());
    }

    #[test]
    fn test_failure_carries_only_error() {
        let env = Envelope::failure("Invalid YouTube URL")
            .with_duration(12.0)
            .with_semitones(2);
        assert_eq!(
            env.to_json(),
            r#"{"success":false,"error":"Invalid YouTube URL"}"#
        );
    }

    #[test]
    fn test_from_exhausted_result() {
        let result = InvocationResult::Failure(Exhausted {
            last: RunError::NonZeroExit {
                code: 1,
                stderr: "ERROR: Private video".to_string(),
            },
            attempts: 3,
        });
        let env = Envelope::from(result);
        assert!(!env.success);
        assert!(env.filepath.is_none());
        assert!(env.error.unwrap().contains("Private video"));
    }
}
