//! Execution limits
//!
//! One immutable value, built once at startup and shared by every run.
//! The limits and the denylist are fixed; only the interpreter and the
//! directory scopes are created under may be chosen by the embedding binary.

use std::path::PathBuf;
use std::time::Duration;

/// Hard ceiling on any requested timeout
pub const MAX_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Timeout used when the caller gives none (or an unusable one)
pub const DEFAULT_TIMEOUT: Duration = MAX_TIMEOUT;

/// Per-stream capture limit in bytes
pub const MAX_OUTPUT_BYTES: usize = 1_000_000;

/// Maximum submitted source size in characters
pub const MAX_CODE_CHARS: usize = 100_000;

/// Delay between SIGTERM and SIGKILL
pub const GRACE_PERIOD: Duration = Duration::from_millis(1_000);

/// Substrings that reject a script outright.
///
/// Plain case-sensitive containment over the whole source. This is a tripwire
/// for obviously destructive scripts, not an isolation boundary: anything
/// that spells the operation differently gets through.
pub const DENYLIST: &[&str] = &[
    // recursive force delete
    "rm -rf",
    "rm -fr",
    "shutil.rmtree('/')",
    "shutil.rmtree(\"/\")",
    // raw disk writes
    "dd if=",
    "> /dev/sd",
    "> /dev/nvme",
    // filesystem formatting
    "mkfs",
    "fdisk",
    "format c:",
    // privilege elevation
    "sudo ",
    "su root",
    "chmod 777 /",
    "chown root",
    // fork bombs
    ":(){",
    "os.fork()",
];

/// Configuration for the execution engine
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Upper bound applied to every requested timeout
    pub max_timeout: Duration,
    /// Timeout used when the request carries none
    pub default_timeout: Duration,
    /// Bytes captured per stream before the process is killed
    pub max_output_bytes: usize,
    /// Maximum source length in characters
    pub max_code_chars: usize,
    /// Wait between graceful and forced termination
    pub grace_period: Duration,
    /// Rejected substrings
    pub denylist: Vec<String>,
    /// Interpreter override; `None` uses the language's own binary
    pub interpreter: Option<PathBuf>,
    /// Parent directory for per-run scopes
    pub scope_root: PathBuf,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_timeout: MAX_TIMEOUT,
            default_timeout: DEFAULT_TIMEOUT,
            max_output_bytes: MAX_OUTPUT_BYTES,
            max_code_chars: MAX_CODE_CHARS,
            grace_period: GRACE_PERIOD,
            denylist: DENYLIST.iter().map(|s| s.to_string()).collect(),
            interpreter: None,
            scope_root: std::env::temp_dir(),
        }
    }
}

impl SandboxConfig {
    /// Run scripts with a specific interpreter binary
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    /// Create per-run scopes under `root` instead of the system temp dir
    pub fn with_scope_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scope_root = root.into();
        self
    }

    /// Resolve a caller-supplied timeout.
    ///
    /// Absent or non-positive values fall back to the default; everything is
    /// clamped to `max_timeout` without complaint.
    pub fn effective_timeout(&self, requested_ms: Option<i64>) -> Duration {
        let requested = match requested_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms as u64),
            _ => self.default_timeout,
        };
        requested.min(self.max_timeout)
    }
}
