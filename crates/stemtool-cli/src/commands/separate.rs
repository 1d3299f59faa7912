use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use stemtool_core::config::Config;
use stemtool_core::transcoder::Transcoder;
use stemtool_core::Envelope;
use stemtool_separate::{SeparationEngine, Separator};

use crate::args::Engine;

pub async fn run(
    input: &Path,
    output_dir: &Path,
    engine: Option<Engine>,
    model: Option<String>,
    device: Option<String>,
    config: &Config,
) -> Result<Envelope> {
    let mut config = config.clone();
    if let Some(model) = model {
        config.separate.model = model;
    }
    if let Some(device) = device {
        config.separate.device = device;
    }

    let engine_name = engine
        .map(|e| e.name().to_string())
        .unwrap_or_else(|| config.separate.engine.clone());
    let engine = SeparationEngine::from_config(&engine_name, &config)?;

    let transcoder = Transcoder::new(
        config.ffmpeg_path()?,
        config.transcode.bitrate.clone(),
        config.transcode.retry.policy(),
    );
    let separator = Separator::new(engine, transcoder, config.separate.retry.policy());

    // Draws on stderr, and only when it is a terminal
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!("Separating with {}...", engine_name));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = separator.separate(input, output_dir).await;
    spinner.finish_and_clear();

    match result {
        Ok(path) => Ok(Envelope::success(path)),
        Err(e) => Ok(Envelope::failure(e.to_string())),
    }
}
