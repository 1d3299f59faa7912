//! stemtool-core: retrying external-tool runner with YouTube download and FFmpeg transcoding

pub mod config;
pub mod downloader;
pub mod envelope;
pub mod error;
pub mod pitch;
pub mod runner;
pub mod transcoder;

pub use config::Config;
pub use envelope::Envelope;
pub use error::{Exhausted, RunError};
pub use runner::{ExpectedOutput, InvocationResult, InvocationSpec, RetryPolicy};
