use anyhow::{Context, Result};
use std::path::Path;
use stemtool_core::config::Config;
use stemtool_core::downloader::{extract_video_id, Downloader};
use stemtool_core::error::DownloadError;
use stemtool_core::Envelope;
use tracing::info;

pub async fn run(url: &str, output_dir: &Path, config: &Config) -> Result<Envelope> {
    info!("Processing YouTube URL: {}", url);
    info!("Output directory: {}", output_dir.display());

    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let Some(video_id) = extract_video_id(url) else {
        return Ok(Envelope::failure(
            DownloadError::InvalidUrl(url.to_string()).to_string(),
        ));
    };

    let downloader = Downloader::new(
        config.yt_dlp_path()?,
        config.download.policy(),
        config.video_info.policy(),
    );

    let info = downloader.fetch_info(&video_id).await;

    match downloader.download(&video_id, output_dir).await {
        Ok(result) => Ok(Envelope::success(result.audio_path)
            .with_video(&video_id, &info.title, &info.artist)
            .with_duration(result.duration)),
        Err(e) => Ok(Envelope::failure(e.to_string())),
    }
}
