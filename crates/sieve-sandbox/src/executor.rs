//! Script execution engine
//!
//! `Executor::run` never fails: every outcome, including rejection, spawn
//! failure and forced termination, comes back as an `ExecutionResult`.
//!
//! Per run: validate, create a scope, write the script, spawn the interpreter
//! in its own process group, then race three events - process exit, the
//! timeout, and either output stream crossing its cap. Exit disarms the
//! timer. Timeout or cap sends SIGTERM to the group, waits one grace period,
//! then SIGKILLs. A clean exit still SIGKILLs the group so nothing the script
//! backgrounded outlives the run. The scope is removed before returning on
//! every path.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::capture::StreamCapture;
use crate::config::SandboxConfig;
use crate::policy::{ScriptPolicy, ValidationError};
use crate::scope::TemporaryScope;
use crate::types::{ExecutionRequest, ExecutionResult, Language, NO_EXIT_CODE};

/// Reported for both forced-termination causes
pub const FORCED_TERMINATION_MESSAGE: &str = "Execution timeout or output limit exceeded";

/// Infrastructure failures, rendered into `ExecutionResult::error`
#[derive(Debug, thiserror::Error)]
enum ExecError {
    #[error("Failed to prepare execution scope: {0}")]
    Prepare(io::Error),
    #[error("{0}")]
    Spawn(io::Error),
    #[error("Failed to wait for process: {0}")]
    Wait(io::Error),
}

/// Why the engine ended the process itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForcedCause {
    Timeout,
    OutputLimit,
}

impl std::fmt::Display for ForcedCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForcedCause::Timeout => write!(f, "timeout"),
            ForcedCause::OutputLimit => write!(f, "output limit"),
        }
    }
}

/// Whichever event won the race
enum Outcome {
    Exited(ExitStatus),
    Forced(ForcedCause),
    WaitFailed(io::Error),
}

/// Runs scripts under a fixed `SandboxConfig`
pub struct Executor {
    config: SandboxConfig,
    policy: ScriptPolicy,
}

impl Executor {
    pub fn new(config: SandboxConfig) -> Self {
        let policy = ScriptPolicy::from_config(&config);
        Self { config, policy }
    }

    /// Policy check only; allocates nothing
    pub fn validate(&self, code: &str) -> Result<(), ValidationError> {
        self.policy.check(code)
    }

    /// Execute one request to completion
    pub async fn run(&self, request: &ExecutionRequest) -> ExecutionResult {
        let execution_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "execute",
            %execution_id,
            language = request.language.as_str()
        );
        self.run_inner(request).instrument(span).await
    }

    async fn run_inner(&self, request: &ExecutionRequest) -> ExecutionResult {
        let started = Instant::now();

        // Validation must finish before anything is allocated
        if let Err(e) = self.policy.check(&request.code) {
            warn!(reason = %e, "Script rejected");
            return ExecutionResult::failed(e.to_string(), elapsed_ms(started));
        }

        let timeout = self.config.effective_timeout(request.timeout_ms);

        let scope = match TemporaryScope::create(&self.config.scope_root) {
            Ok(scope) => scope,
            Err(e) => {
                let e = ExecError::Prepare(e);
                warn!(error = %e, "Scope creation failed");
                return ExecutionResult::failed(e.to_string(), elapsed_ms(started));
            }
        };

        let mut result = self.run_in_scope(&scope, request, timeout).await;
        scope.close();

        result.execution_time = elapsed_ms(started);
        info!(
            success = result.success,
            exit_code = result.exit_code,
            elapsed_ms = result.execution_time,
            "Execution finished"
        );
        result
    }

    async fn run_in_scope(
        &self,
        scope: &TemporaryScope,
        request: &ExecutionRequest,
        timeout: Duration,
    ) -> ExecutionResult {
        let script = match scope
            .write_script(request.language.script_name(), &request.code)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                let e = ExecError::Prepare(e);
                warn!(error = %e, "Script write failed");
                // execution_time is stamped by run_inner
                return ExecutionResult::failed(e.to_string(), 0);
            }
        };

        let cwd = request.working_dir.as_deref().unwrap_or(scope.path());
        let interpreter = self.interpreter_for(request.language);
        debug!(
            interpreter = %interpreter.display(),
            cwd = %cwd.display(),
            timeout_ms = timeout.as_millis() as u64,
            "Spawning interpreter"
        );

        let mut child = match build_command(&interpreter, request.language, &script, cwd).spawn() {
            Ok(child) => child,
            Err(e) => {
                let e = ExecError::Spawn(e);
                warn!(interpreter = %interpreter.display(), error = %e, "Spawn failed");
                // execution_time is stamped by run_inner
                return ExecutionResult::failed(e.to_string(), 0);
            }
        };

        // Read before the wait reaps the child; the group outlives it
        let pid = child.id();

        let cap = self.config.max_output_bytes;
        let limit_hit = Arc::new(Notify::new());
        let stdout = child
            .stdout
            .take()
            .map(|s| StreamCapture::spawn(s, cap, Arc::clone(&limit_hit)));
        let stderr = child
            .stderr
            .take()
            .map(|s| StreamCapture::spawn(s, cap, Arc::clone(&limit_hit)));

        // Dropping the losing branches disarms the timer and the limit watch
        let mut outcome = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => Outcome::Exited(status),
                Err(e) => Outcome::WaitFailed(e),
            },
            _ = tokio::time::sleep(timeout) => Outcome::Forced(ForcedCause::Timeout),
            _ = limit_hit.notified() => Outcome::Forced(ForcedCause::OutputLimit),
        };

        match &outcome {
            Outcome::Forced(cause) => {
                warn!(%cause, "Terminating process");
                terminate(&mut child, self.config.grace_period).await;
            }
            Outcome::WaitFailed(e) => {
                warn!(error = %e, "Lost track of process, killing");
                terminate(&mut child, Duration::ZERO).await;
            }
            Outcome::Exited(_) => kill_stragglers(pid),
        }

        let grace = self.config.grace_period;
        let ((stdout, stdout_over), (stderr, stderr_over)) = tokio::join!(
            finish_capture(stdout, grace),
            finish_capture(stderr, grace)
        );

        // A stream that crossed its cap marks the run forced even if the
        // process managed to exit first
        if (stdout_over || stderr_over) && !matches!(outcome, Outcome::Forced(_)) {
            warn!("Output limit crossed before exit was observed");
            outcome = Outcome::Forced(ForcedCause::OutputLimit);
        }

        classify(outcome, stdout, stderr)
    }

    fn interpreter_for(&self, language: Language) -> PathBuf {
        self.config
            .interpreter
            .clone()
            .unwrap_or_else(|| PathBuf::from(language.interpreter()))
    }
}

fn build_command(interpreter: &Path, language: Language, script: &Path, cwd: &Path) -> Command {
    let (env_key, env_value) = language.unbuffered_env();
    let mut command = Command::new(interpreter);
    command
        .arg(script)
        .current_dir(cwd)
        .env(env_key, env_value)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so signals reach anything the script forks
    #[cfg(unix)]
    command.process_group(0);

    command
}

async fn finish_capture(capture: Option<StreamCapture>, grace: Duration) -> (String, bool) {
    match capture {
        Some(capture) => capture.finish(grace).await,
        None => (String::new(), false),
    }
}

fn classify(outcome: Outcome, stdout: String, stderr: String) -> ExecutionResult {
    let (success, exit_code, error) = match outcome {
        Outcome::Exited(status) => match status.code() {
            Some(0) => (true, 0, None),
            Some(code) => (false, code, None),
            None => (false, NO_EXIT_CODE, Some(describe_abnormal_exit(&status))),
        },
        Outcome::Forced(_) => (
            false,
            NO_EXIT_CODE,
            Some(FORCED_TERMINATION_MESSAGE.to_string()),
        ),
        Outcome::WaitFailed(e) => (false, NO_EXIT_CODE, Some(ExecError::Wait(e).to_string())),
    };

    ExecutionResult {
        success,
        exit_code,
        stdout,
        stderr,
        execution_time: 0,
        error,
    }
}

#[cfg(unix)]
fn describe_abnormal_exit(status: &ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => format!("Process terminated by signal {}", signal),
        None => "Process exited without a status code".to_string(),
    }
}

#[cfg(not(unix))]
fn describe_abnormal_exit(_status: &ExitStatus) -> String {
    "Process exited without a status code".to_string()
}

/// SIGTERM the group, wait up to `grace`, then SIGKILL
#[cfg(unix)]
async fn terminate(child: &mut Child, grace: Duration) {
    // Already reaped
    let Some(pid) = child.id() else {
        return;
    };

    if !grace.is_zero() {
        signal_group(pid, libc::SIGTERM);
        if tokio::time::timeout(grace, child.wait()).await.is_ok() {
            debug!("Process exited after SIGTERM");
            return;
        }
        warn!(grace_ms = grace.as_millis() as u64, "Process survived SIGTERM, killing");
    }

    signal_group(pid, libc::SIGKILL);
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Kill after SIGKILL reported an error");
    }
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, _grace: Duration) {
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Kill reported an error");
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers; a negative pid addresses the process
    // group created for this child at spawn.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc != 0 {
        let error = io::Error::last_os_error();
        // Empty group
        if error.raw_os_error() == Some(libc::ESRCH) {
            return;
        }
        debug!(
            pgid,
            signal,
            error = %error,
            "Signal delivery failed"
        );
    }
}

/// The interpreter is gone; SIGKILL anything it left running in its group
#[cfg(unix)]
fn kill_stragglers(pid: Option<u32>) {
    if let Some(pid) = pid {
        signal_group(pid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_stragglers(_pid: Option<u32>) {}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh_executor(root: &Path) -> Executor {
        Executor::new(
            SandboxConfig::default()
                .with_interpreter("sh")
                .with_scope_root(root),
        )
    }

    #[test]
    fn test_classify_success() {
        let status = std::process::Command::new("true").status().unwrap();
        let result = classify(Outcome::Exited(status), "ok\n".into(), String::new());
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_classify_non_zero() {
        let status = std::process::Command::new("sh")
            .args(["-c", "exit 7"])
            .status()
            .unwrap();
        let result = classify(Outcome::Exited(status), String::new(), String::new());
        assert!(!result.success);
        assert_eq!(result.exit_code, 7);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_classify_forced_causes_share_message() {
        for cause in [ForcedCause::Timeout, ForcedCause::OutputLimit] {
            let result = classify(Outcome::Forced(cause), "partial".into(), String::new());
            assert!(!result.success);
            assert_eq!(result.exit_code, NO_EXIT_CODE);
            assert_eq!(result.error.as_deref(), Some(FORCED_TERMINATION_MESSAGE));
            assert_eq!(result.stdout, "partial");
        }
    }

    #[test]
    fn test_classify_signal_death() {
        let status = std::process::Command::new("sh")
            .args(["-c", "kill -9 $$"])
            .status()
            .unwrap();
        let result = classify(Outcome::Exited(status), String::new(), String::new());
        assert_eq!(result.exit_code, NO_EXIT_CODE);
        assert_eq!(
            result.error.as_deref(),
            Some("Process terminated by signal 9")
        );
    }

    #[test]
    fn test_default_interpreter_per_language() {
        let executor = Executor::new(SandboxConfig::default());
        assert_eq!(
            executor.interpreter_for(Language::Python),
            PathBuf::from("python3")
        );
        let root = tempfile::tempdir().unwrap();
        assert_eq!(
            sh_executor(root.path()).interpreter_for(Language::Python),
            PathBuf::from("sh")
        );
    }

    #[tokio::test]
    async fn test_rejected_script_allocates_nothing() {
        let root = tempfile::tempdir().unwrap();
        let executor = sh_executor(root.path());

        let result = executor
            .run(&ExecutionRequest::python("echo 'rm -rf' is not welcome"))
            .await;

        assert!(!result.success);
        assert_eq!(result.exit_code, NO_EXIT_CODE);
        assert!(result.error.unwrap().contains("rm -rf"));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_scope_root_is_prepare_error() {
        let root = tempfile::tempdir().unwrap();
        let executor = sh_executor(&root.path().join("gone"));

        let result = executor.run(&ExecutionRequest::python("echo hi")).await;

        assert!(!result.success);
        assert_eq!(result.exit_code, NO_EXIT_CODE);
        assert!(result
            .error
            .unwrap()
            .starts_with("Failed to prepare execution scope"));
    }

    #[tokio::test]
    async fn test_spawn_error_reports_os_text_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let executor = Executor::new(
            SandboxConfig::default()
                .with_interpreter(root.path().join("no-such-interpreter"))
                .with_scope_root(root.path()),
        );

        let result = executor.run(&ExecutionRequest::python("print(1)")).await;

        assert!(!result.success);
        assert_eq!(result.exit_code, NO_EXIT_CODE);
        let expected = io::Error::from(io::ErrorKind::NotFound).to_string();
        let error = result.error.unwrap();
        assert!(!error.is_empty());
        assert!(
            error.to_lowercase().contains("no such file") || error.contains(&expected),
            "unexpected spawn error: {}",
            error
        );
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
