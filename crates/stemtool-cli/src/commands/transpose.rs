use anyhow::{Context, Result};
use std::path::Path;
use stemtool_core::config::Config;
use stemtool_core::pitch::{semitones_between, Key};
use stemtool_core::transcoder::Transcoder;
use stemtool_core::Envelope;
use tracing::info;

use crate::args::ShiftArgs;

pub async fn run(input: &Path, output_dir: &Path, shift: &ShiftArgs, config: &Config) -> Result<Envelope> {
    let semitones = resolve_semitones(shift)?;
    info!("Transposing by {} semitones", semitones);

    let transcoder = Transcoder::new(
        config.ffmpeg_path()?,
        config.transcode.bitrate.clone(),
        config.transcode.retry.policy(),
    );

    match transcoder.transpose(input, output_dir, semitones).await {
        Ok(artifact) => Ok(Envelope::success(artifact.filepath).with_semitones(semitones)),
        Err(e) => Ok(Envelope::failure(e.to_string())),
    }
}

fn resolve_semitones(shift: &ShiftArgs) -> Result<i32> {
    if let Some(semitones) = shift.semitones {
        return Ok(semitones);
    }

    let from: Key = shift
        .from_key
        .as_deref()
        .context("--from-key is required without --semitones")?
        .parse()?;
    let to: Key = shift
        .to_key
        .as_deref()
        .context("--to-key is required without --semitones")?
        .parse()?;

    Ok(semitones_between(
        from,
        to,
        shift.from_scale.into(),
        shift.to_scale.into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ScaleArg;

    fn shift(from: &str, to: &str, from_scale: ScaleArg, to_scale: ScaleArg) -> ShiftArgs {
        ShiftArgs {
            semitones: None,
            from_key: Some(from.to_string()),
            to_key: Some(to.to_string()),
            from_scale,
            to_scale,
        }
    }

    #[test]
    fn test_resolve_from_keys() {
        let s = shift("C", "A", ScaleArg::Major, ScaleArg::Minor);
        assert_eq!(resolve_semitones(&s).unwrap(), -6);
    }

    #[test]
    fn test_explicit_semitones_win() {
        let mut s = shift("C", "D", ScaleArg::Major, ScaleArg::Major);
        s.semitones = Some(-1);
        assert_eq!(resolve_semitones(&s).unwrap(), -1);
    }

    #[test]
    fn test_invalid_key() {
        let s = shift("C", "X", ScaleArg::Major, ScaleArg::Major);
        let err = resolve_semitones(&s).unwrap_err();
        assert_eq!(err.to_string(), "Invalid key: X");
    }
}
