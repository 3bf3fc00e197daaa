//! Request and result types shared with callers

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Exit code reported when the process produced no real one
pub const NO_EXIT_CODE: i32 = -1;

/// Interpreters the engine knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
}

impl Language {
    /// Binary invoked when the config carries no override
    pub fn interpreter(&self) -> &'static str {
        match self {
            Language::Python => "python3",
        }
    }

    /// File name the script is written to inside its scope
    pub fn script_name(&self) -> &'static str {
        match self {
            Language::Python => "script.py",
        }
    }

    /// Environment that disables interpreter-level output buffering
    pub fn unbuffered_env(&self) -> (&'static str, &'static str) {
        match self {
            Language::Python => ("PYTHONUNBUFFERED", "1"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Language::Python),
            _ => Err(UnsupportedLanguage(s.to_string())),
        }
    }
}

/// One execution request. The engine only ever borrows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub code: String,
    #[serde(default = "default_language")]
    pub language: Language,
    /// Milliseconds; absent or non-positive means the configured default
    #[serde(default)]
    pub timeout_ms: Option<i64>,
    /// Working directory for the process; the script still lives in its own scope
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_language() -> Language {
    Language::Python
}

impl ExecutionRequest {
    pub fn new(language: Language, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language,
            timeout_ms: None,
            working_dir: None,
        }
    }

    pub fn python(code: impl Into<String>) -> Self {
        Self::new(Language::Python, code)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Outcome of one run. Always fully populated.
///
/// `success` implies `exit_code == 0` and no `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock milliseconds from acceptance to result
    pub execution_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A run that never reached a real exit status
    pub fn failed(error: impl Into<String>, execution_time: u64) -> Self {
        Self {
            success: false,
            exit_code: NO_EXIT_CODE,
            stdout: String::new(),
            stderr: String::new(),
            execution_time,
            error: Some(error.into()),
        }
    }
}
