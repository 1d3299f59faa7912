//! Bounded-retry execution of external commands
//!
//! An [`InvocationSpec`] describes one long-running, possibly flaky external
//! command together with the file it is expected to leave behind. [`run`]
//! executes it with a per-attempt timeout, retries on timeout, non-zero exit,
//! or a missing/empty artifact, and reports an [`InvocationResult`].
//!
//! Attempts are strictly sequential. The delay between attempts is fixed.

use crate::error::{Exhausted, RunError};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Default number of attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default fixed delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Parses an auxiliary number out of a command's stdout.
pub type MetricParser = fn(&str) -> Option<f64>;

/// Locates the artifact inside an output directory after a successful exit.
pub type Locator = Arc<dyn Fn(&Path) -> Option<PathBuf> + Send + Sync>;

/// Timeout and retry budget for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Attempt budget, treated as at least 1
    pub max_attempts: u32,
    /// Fixed sleep between attempts
    pub retry_delay: Duration,
    /// Pause after a clean exit before the artifact is inspected
    pub settle_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            settle_delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    fn budget(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Where the artifact of an invocation is expected to appear.
#[derive(Clone)]
pub enum ExpectedOutput {
    /// A fixed, known-in-advance file path.
    File(PathBuf),
    /// A file found by `locate` inside `dir` once the command exits cleanly.
    Discover { dir: PathBuf, locate: Locator },
}

impl ExpectedOutput {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        ExpectedOutput::File(path.into())
    }

    pub fn discover<F>(dir: impl Into<PathBuf>, locate: F) -> Self
    where
        F: Fn(&Path) -> Option<PathBuf> + Send + Sync + 'static,
    {
        ExpectedOutput::Discover {
            dir: dir.into(),
            locate: Arc::new(locate),
        }
    }

    /// Directory that must exist before the first attempt.
    pub fn output_dir(&self) -> Option<&Path> {
        match self {
            ExpectedOutput::File(path) => path.parent().filter(|p| !p.as_os_str().is_empty()),
            ExpectedOutput::Discover { dir, .. } => Some(dir),
        }
    }
}

impl fmt::Debug for ExpectedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedOutput::File(path) => f.debug_tuple("File").field(path).finish(),
            ExpectedOutput::Discover { dir, .. } => {
                f.debug_struct("Discover").field("dir", dir).finish_non_exhaustive()
            }
        }
    }
}

/// One external command and the artifact it must produce.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    policy: RetryPolicy,
    expected: ExpectedOutput,
    metric: Option<MetricParser>,
}

impl InvocationSpec {
    pub fn new(program: impl Into<PathBuf>, expected: ExpectedOutput) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            policy: RetryPolicy::default(),
            expected,
            metric: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Parse an auxiliary number (e.g. a duration) from stdout on success.
    pub fn metric(mut self, parser: MetricParser) -> Self {
        self.metric = Some(parser);
        self
    }

    pub fn expected(&self) -> &ExpectedOutput {
        &self.expected
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Validated artifact of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub filepath: PathBuf,
    /// Number parsed from stdout, if a parser was set and it matched
    pub metric: Option<f64>,
    /// 1-based attempt that succeeded
    pub attempts: u32,
}

/// Outcome of [`run`]. Exactly one of an artifact or an error.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Success(Artifact),
    Failure(Exhausted),
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success(_))
    }

    pub fn attempts(&self) -> u32 {
        match self {
            InvocationResult::Success(artifact) => artifact.attempts,
            InvocationResult::Failure(exhausted) => exhausted.attempts,
        }
    }

    pub fn into_result(self) -> Result<Artifact, Exhausted> {
        match self {
            InvocationResult::Success(artifact) => Ok(artifact),
            InvocationResult::Failure(exhausted) => Err(exhausted),
        }
    }
}

/// Captured output of a process that ran to completion.
#[derive(Debug, Clone)]
pub struct Captured {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Kills a child's whole process group when dropped.
///
/// The child leads its own group, so helpers it forks (ffmpeg under yt-dlp,
/// Python workers under Demucs) go down with it.
struct ProcessGroup(Option<u32>);

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pgid) = self.0.take() {
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    // ESRCH once every member has already exited
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        if e != nix::errno::Errno::ESRCH {
            warn!("Failed to kill process group {}: {}", pgid, e);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Spawn `program` and wait for it, killing it if `timeout` elapses.
///
/// The child runs in its own process group. The whole group is killed on
/// timeout, after the leader exits, and on any other path that drops the
/// future before it completes.
pub async fn capture(
    program: &Path,
    args: &[OsString],
    current_dir: Option<&Path>,
    timeout: Duration,
) -> Result<Captured, RunError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|e| {
        RunError::Unexpected(format!("failed to spawn {}: {e}", program.display()))
    })?;
    let _group = ProcessGroup(child.id());

    let waited = tokio::time::timeout(timeout, child.wait_with_output()).await;
    match waited {
        Ok(Ok(output)) => Ok(Captured {
            // Killed by a signal
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }),
        Ok(Err(e)) => Err(RunError::Unexpected(format!(
            "I/O error waiting for {}: {e}",
            program.display()
        ))),
        // The wait future is already dropped; `_group` kills the rest.
        Err(_elapsed) => Err(RunError::Timeout(timeout)),
    }
}

enum Attempt {
    Succeeded(Artifact),
    TimedOut(RunError),
    Failed(RunError),
}

/// Execute `spec` until it yields a non-empty artifact or the budget runs out.
pub async fn run(spec: &InvocationSpec) -> InvocationResult {
    let name = spec.program_name();
    let budget = spec.policy.budget();

    if let Some(dir) = spec.expected.output_dir() {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            return InvocationResult::Failure(Exhausted {
                last: RunError::Unexpected(format!(
                    "failed to create output directory {}: {e}",
                    dir.display()
                )),
                attempts: 0,
            });
        }
    }

    info!("Running {}", name);
    debug!("Command: {}", spec.command_line());

    let mut last = RunError::Unexpected("no attempt was made".to_string());
    let mut attempt = 0;
    while attempt < budget {
        attempt += 1;

        match attempt_once(spec, attempt, budget).await {
            Attempt::Succeeded(artifact) => {
                info!(
                    "{} produced {} (attempt {}/{})",
                    name,
                    artifact.filepath.display(),
                    attempt,
                    budget
                );
                return InvocationResult::Success(artifact);
            }
            Attempt::TimedOut(err) | Attempt::Failed(err) => {
                warn!("{} failed (attempt {}/{}): {}", name, attempt, budget, err);
                last = err;
            }
        }

        if attempt < budget {
            tokio::time::sleep(spec.policy.retry_delay).await;
        }
    }

    InvocationResult::Failure(Exhausted {
        last,
        attempts: attempt,
    })
}

async fn attempt_once(spec: &InvocationSpec, attempt: u32, budget: u32) -> Attempt {
    let captured = match capture(
        &spec.program,
        &spec.args,
        spec.current_dir.as_deref(),
        spec.policy.timeout,
    )
    .await
    {
        Ok(captured) => captured,
        Err(err @ RunError::Timeout(_)) => return Attempt::TimedOut(err),
        Err(err) => return Attempt::Failed(err),
    };

    if !captured.stdout.trim().is_empty() {
        debug!("{} stdout: {}", spec.program_name(), captured.stdout.trim());
    }
    if !captured.stderr.trim().is_empty() {
        debug!("{} stderr: {}", spec.program_name(), captured.stderr.trim());
    }

    if !captured.success() {
        return Attempt::Failed(RunError::NonZeroExit {
            code: captured.code,
            stderr: captured.stderr.trim().to_string(),
        });
    }

    if !spec.policy.settle_delay.is_zero() {
        tokio::time::sleep(spec.policy.settle_delay).await;
    }

    let path = match &spec.expected {
        ExpectedOutput::File(path) => path.clone(),
        ExpectedOutput::Discover { dir, locate } => match locate(dir) {
            Some(path) => path,
            None => {
                return Attempt::Failed(RunError::MissingOutput {
                    expected: dir.clone(),
                })
            }
        },
    };

    let len = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Attempt::Failed(RunError::MissingOutput { expected: path });
        }
        Err(e) => {
            return Attempt::Failed(RunError::Unexpected(format!(
                "failed to inspect {}: {e}",
                path.display()
            )));
        }
    };
    debug!("Output {} has {} bytes", path.display(), len);

    if len == 0 {
        // The last empty file is left for the caller to see.
        if attempt < budget {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove empty output {}: {}", path.display(), e);
            }
        }
        return Attempt::Failed(RunError::EmptyOutput { path });
    }

    Attempt::Succeeded(Artifact {
        filepath: path,
        metric: spec.metric.and_then(|parse| parse(&captured.stdout)),
        attempts: attempt,
    })
}

/// First stdout line that is a plain decimal number, e.g. a duration.
pub fn parse_leading_number(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| is_plain_decimal(line))
        .and_then(|line| line.parse().ok())
}

fn is_plain_decimal(s: &str) -> bool {
    let mut dots = 0;
    let mut digits = 0;
    for c in s.chars() {
        match c {
            '.' => dots += 1,
            '0'..='9' => digits += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}
