//! YouTube audio downloader using yt-dlp

use crate::error::{DownloadError, RunError};
use crate::runner::{self, parse_leading_number, ExpectedOutput, InvocationSpec, RetryPolicy};
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// File name of the downloaded track inside the output directory.
pub const ORIGINAL_FILE_NAME: &str = "original.mp3";

#[derive(Debug)]
pub struct Downloader {
    yt_dlp_path: PathBuf,
    download_policy: RetryPolicy,
    info_policy: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    pub title: String,
    pub artist: String,
}

impl Default for VideoInfo {
    fn default() -> Self {
        Self {
            title: UNKNOWN_TITLE.to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResult {
    pub audio_path: PathBuf,
    /// Seconds, 0 when yt-dlp did not report a parseable duration
    pub duration: f64,
    pub attempts: u32,
}

impl Downloader {
    pub fn new(yt_dlp_path: PathBuf, download_policy: RetryPolicy, info_policy: RetryPolicy) -> Self {
        Self {
            yt_dlp_path,
            download_policy,
            info_policy,
        }
    }

    /// Look up title and channel. Never fails; unknown fields fall back to placeholders.
    pub async fn fetch_info(&self, video_id: &str) -> VideoInfo {
        info!("Getting video info for {}", video_id);

        let mut args: Vec<OsString> = ["--print", "title", "--print", "channel", "--skip-download"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(watch_url(video_id).into());

        let budget = self.info_policy.max_attempts.max(1);
        for attempt in 1..=budget {
            let err = match runner::capture(&self.yt_dlp_path, &args, None, self.info_policy.timeout)
                .await
            {
                Ok(captured) if captured.success() => {
                    let info = parse_video_info(&captured.stdout);
                    debug!("Video info - Title: {}, Artist: {}", info.title, info.artist);
                    return info;
                }
                Ok(captured) => RunError::NonZeroExit {
                    code: captured.code,
                    stderr: captured.stderr.trim().to_string(),
                },
                Err(e) => e,
            };
            warn!(
                "Error getting video info (attempt {}/{}): {}",
                attempt, budget, err
            );

            // A timeout already waited long enough
            if attempt < budget && !err.is_timeout() {
                tokio::time::sleep(self.info_policy.retry_delay).await;
            }
        }

        VideoInfo::default()
    }

    /// Download the audio track of `video_id` as `<output_dir>/original.mp3`.
    pub async fn download(
        &self,
        video_id: &str,
        output_dir: &Path,
    ) -> Result<DownloadResult, DownloadError> {
        info!("Downloading audio for {} to {}", video_id, output_dir.display());

        let spec = self.download_spec(video_id, output_dir);
        let artifact = runner::run(&spec).await.into_result()?;

        Ok(DownloadResult {
            audio_path: artifact.filepath,
            duration: artifact.metric.unwrap_or(0.0),
            attempts: artifact.attempts,
        })
    }

    fn download_spec(&self, video_id: &str, output_dir: &Path) -> InvocationSpec {
        let output_file = output_dir.join(ORIGINAL_FILE_NAME);
        // yt-dlp fills in the extension after the mp3 conversion
        let output_template = output_dir.join("original.%(ext)s");

        InvocationSpec::new(&self.yt_dlp_path, ExpectedOutput::file(output_file))
            .args([
                // Extract audio and convert to best-quality MP3
                "-x",
                "--audio-format", "mp3",
                "--audio-quality", "0",
                "--no-playlist",
                "--restrict-filenames",
                // yt-dlp's own network retries, inside each attempt
                "--retries", "3",
                "--fragment-retries", "3",
                "--force-overwrites",
                // --print would otherwise imply --simulate
                "--no-simulate",
                "--print", "duration",
                "-o",
            ])
            .arg(output_template)
            .arg(watch_url(video_id))
            .policy(self.download_policy.clone())
            .metric(parse_leading_number)
    }
}

/// Canonical watch URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Extract the 11-character video id from a YouTube URL
pub fn extract_video_id(url: &str) -> Option<String> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?:https?://)?(?:www\.|m\.|music\.)?(?:youtube\.com/(?:watch\?v=|embed/|v/|shorts/)|youtu\.be/)([a-zA-Z0-9_-]{11})",
            )
            .ok()
        })
        .as_ref()?;

    let caps = re.captures(url)?;
    Some(caps.get(1)?.as_str().to_string())
}

fn parse_video_info(stdout: &str) -> VideoInfo {
    let mut lines = stdout.lines().map(str::trim);
    let mut field = |fallback: &str| {
        lines
            .next()
            .filter(|l| !l.is_empty() && *l != "NA")
            .map(String::from)
            .unwrap_or_else(|| fallback.to_string())
    };

    VideoInfo {
        title: field(UNKNOWN_TITLE),
        artist: field(UNKNOWN_ARTIST),
    }
}
