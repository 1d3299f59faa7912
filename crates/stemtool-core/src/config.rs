//! Configuration management for stemtool

use crate::error::ConfigError;
use crate::runner::RetryPolicy;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub download: RetryConfig,
    pub video_info: RetryConfig,
    pub separate: SeparateConfig,
    pub transcode: TranscodeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Path to yt-dlp binary (auto-detected if not set)
    pub yt_dlp: Option<PathBuf>,
    /// Path to FFmpeg binary (auto-detected if not set)
    pub ffmpeg: Option<PathBuf>,
    /// Python used to run Demucs (auto-detected if not set)
    pub python: Option<PathBuf>,
    /// Path to the spleeter entry point (auto-detected if not set)
    pub spleeter: Option<PathBuf>,
}

/// Timeout and retry settings for one kind of external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    /// Wait after a clean exit before checking the output file
    pub settle_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparateConfig {
    /// "demucs" or "spleeter"
    pub engine: String,
    /// Demucs model name
    pub model: String,
    /// Demucs device ("cpu", "cuda", "mps")
    pub device: String,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// MP3 bitrate passed to FFmpeg
    pub bitrate: String,
    pub retry: RetryConfig,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(format!(
                "{section}: max_attempts must be at least 1"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(format!(
                "{section}: timeout_secs must be at least 1"
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                yt_dlp: None,
                ffmpeg: None,
                python: None,
                spleeter: None,
            },
            download: RetryConfig {
                timeout_secs: 120,
                max_attempts: 3,
                retry_delay_secs: 2,
                settle_delay_ms: 1000,
            },
            video_info: RetryConfig {
                timeout_secs: 30,
                max_attempts: 3,
                retry_delay_secs: 1,
                settle_delay_ms: 0,
            },
            separate: SeparateConfig {
                engine: "demucs".to_string(),
                model: "htdemucs_ft".to_string(),
                device: "cpu".to_string(),
                retry: RetryConfig {
                    timeout_secs: 1800,
                    max_attempts: 1,
                    retry_delay_secs: 2,
                    settle_delay_ms: 0,
                },
            },
            transcode: TranscodeConfig {
                bitrate: "320k".to_string(),
                retry: RetryConfig {
                    timeout_secs: 600,
                    max_attempts: 1,
                    retry_delay_secs: 2,
                    settle_delay_ms: 0,
                },
            },
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Load from default config directory
        if let Some(path) = Self::default_path() {
            if path.exists() {
                figment = figment.merge(Toml::file(&path));
            }
        }

        // Load from specified config file
        if let Some(path) = config_file {
            if !path.exists() {
                return Err(ConfigError::LoadError(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        // Nested keys use a double underscore, e.g. STEMTOOL_DOWNLOAD__MAX_ATTEMPTS
        figment = figment.merge(Env::prefixed("STEMTOOL_").split("__"));

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `<config_dir>/stemtool/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("stemtool/config.toml"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.download.validate("download")?;
        self.video_info.validate("video_info")?;
        self.separate.retry.validate("separate.retry")?;
        self.transcode.retry.validate("transcode.retry")?;
        Ok(())
    }

    /// Get yt-dlp path, auto-detecting if not configured
    pub fn yt_dlp_path(&self) -> Result<PathBuf, ConfigError> {
        resolve(self.paths.yt_dlp.as_ref(), "yt-dlp")
    }

    /// Get FFmpeg path, auto-detecting if not configured
    pub fn ffmpeg_path(&self) -> Result<PathBuf, ConfigError> {
        resolve(self.paths.ffmpeg.as_ref(), "ffmpeg")
    }

    /// Get spleeter path, auto-detecting if not configured
    pub fn spleeter_path(&self) -> Result<PathBuf, ConfigError> {
        resolve(self.paths.spleeter.as_ref(), "spleeter")
    }

    /// Get Python path, preferring venv if available
    pub fn python_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.paths.python {
            return Ok(path.clone());
        }

        let venv_paths = [
            dirs::data_dir().map(|d| d.join("stemtool/venv/bin/python")),
            dirs::home_dir().map(|d| d.join(".local/share/stemtool/venv/bin/python")),
        ];

        for path in venv_paths.into_iter().flatten() {
            if path.exists() {
                return Ok(path);
            }
        }

        which::which("python3")
            .or_else(|_| which::which("python"))
            .map_err(|_| ConfigError::InvalidValue("python3 not found in PATH".to_string()))
    }
}

fn resolve(configured: Option<&PathBuf>, binary: &str) -> Result<PathBuf, ConfigError> {
    match configured {
        Some(path) => Ok(path.clone()),
        None => which::which(binary)
            .map_err(|_| ConfigError::InvalidValue(format!("{binary} not found in PATH"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let config = Config::default();
        let download = config.download.policy();
        assert_eq!(download.timeout, Duration::from_secs(120));
        assert_eq!(download.max_attempts, 3);
        assert_eq!(download.retry_delay, Duration::from_secs(2));
        assert_eq!(download.settle_delay, Duration::from_secs(1));

        let info = config.video_info.policy();
        assert_eq!(info.timeout, Duration::from_secs(30));
        assert_eq!(info.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_load_overrides_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stemtool.toml");
        std::fs::write(
            &path,
            r#"
[paths]
ffmpeg = "/opt/ffmpeg/bin/ffmpeg"

[download]
timeout_secs = 60
max_attempts = 5
retry_delay_secs = 3
settle_delay_ms = 0

[separate]
engine = "spleeter"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.download.max_attempts, 5);
        assert_eq!(config.download.timeout_secs, 60);
        assert_eq!(config.separate.engine, "spleeter");
        // Untouched keys keep their defaults
        assert_eq!(config.separate.model, "htdemucs_ft");
        assert_eq!(
            config.ffmpeg_path().unwrap(),
            PathBuf::from("/opt/ffmpeg/bin/ffmpeg")
        );
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defaults.toml");
        std::fs::write(&path, toml::to_string_pretty(&Config::default()).unwrap()).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.transcode.bitrate, "320k");
        assert_eq!(config.separate.retry, Config::default().separate.retry);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[video_info]\nmax_attempts = 0\n").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("video_info"), "{err}");
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/stemtool.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }
}
