use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stemtool")]
#[command(author, version, about = "YouTube download, vocal removal and transposition with JSON results")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output on stderr (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Config file path
    #[arg(long, global = true, env = "STEMTOOL_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the audio of a YouTube video as <OUTPUT_DIR>/original.mp3
    Download {
        /// YouTube URL
        url: String,

        /// Directory for the downloaded track (created if missing)
        output_dir: PathBuf,
    },

    /// Remove vocals, writing <OUTPUT_DIR>/instrumental.mp3
    Separate {
        /// Mixed audio file
        input: PathBuf,

        /// Directory for the instrumental and intermediate stems
        output_dir: PathBuf,

        /// Separation engine (defaults to the configured one)
        #[arg(short, long, value_enum)]
        engine: Option<Engine>,

        /// Demucs model name
        #[arg(long)]
        model: Option<String>,

        /// Demucs device (cpu, cuda, mps)
        #[arg(long)]
        device: Option<String>,
    },

    /// Pitch-shift a track, writing <OUTPUT_DIR>/transposed_<N>.mp3
    Transpose {
        /// Audio file to transpose
        input: PathBuf,

        /// Directory for the transposed track
        output_dir: PathBuf,

        #[command(flatten)]
        shift: ShiftArgs,
    },

    /// Check external tool dependencies
    Doctor,

    /// Show configuration
    Config,
}

#[derive(Args, Clone, Debug)]
pub struct ShiftArgs {
    /// Semitones to shift by (negative lowers the pitch)
    #[arg(
        short,
        long,
        allow_negative_numbers = true,
        required_unless_present = "from_key",
        conflicts_with_all = ["from_key", "to_key"]
    )]
    pub semitones: Option<i32>,

    /// Current key of the track (C, C#, D, ... B)
    #[arg(long, requires = "to_key")]
    pub from_key: Option<String>,

    /// Target key
    #[arg(long, requires = "from_key")]
    pub to_key: Option<String>,

    /// Current scale
    #[arg(long, value_enum, default_value = "major")]
    pub from_scale: ScaleArg,

    /// Target scale
    #[arg(long, value_enum, default_value = "major")]
    pub to_scale: ScaleArg,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Engine {
    /// Demucs (htdemucs_ft by default), best quality
    Demucs,
    /// Spleeter 2-stem model, faster
    Spleeter,
}

impl Engine {
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Demucs => "demucs",
            Engine::Spleeter => "spleeter",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleArg {
    Major,
    Minor,
}

impl From<ScaleArg> for stemtool_core::pitch::Scale {
    fn from(scale: ScaleArg) -> Self {
        match scale {
            ScaleArg::Major => stemtool_core::pitch::Scale::Major,
            ScaleArg::Minor => stemtool_core::pitch::Scale::Minor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_transpose_negative_semitones() {
        let cli = Cli::try_parse_from(["stemtool", "transpose", "in.mp3", "out", "--semitones", "-3"])
            .unwrap();
        match cli.command {
            Commands::Transpose { shift, .. } => assert_eq!(shift.semitones, Some(-3)),
            _ => panic!("expected transpose"),
        }
    }

    #[test]
    fn test_transpose_needs_a_shift() {
        assert!(Cli::try_parse_from(["stemtool", "transpose", "in.mp3", "out"]).is_err());
        assert!(Cli::try_parse_from([
            "stemtool", "transpose", "in.mp3", "out", "--from-key", "C"
        ])
        .is_err());
    }

    #[test]
    fn test_transpose_by_keys() {
        let cli = Cli::try_parse_from([
            "stemtool", "transpose", "in.mp3", "out", "--from-key", "C", "--to-key", "A",
            "--to-scale", "minor",
        ])
        .unwrap();
        match cli.command {
            Commands::Transpose { shift, .. } => {
                assert_eq!(shift.from_key.as_deref(), Some("C"));
                assert_eq!(shift.to_scale, ScaleArg::Minor);
            }
            _ => panic!("expected transpose"),
        }
    }
}
