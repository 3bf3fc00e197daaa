//! Sieve Sandbox - bounded script execution
//!
//! Not a container. A script runs as an ordinary child process with the
//! caller's privileges; what this crate guarantees is that the run ends
//! (timeout with SIGTERM/SIGKILL escalation), that captured output stays
//! bounded, that obviously destructive scripts are refused up front, and
//! that the scratch directory is gone when `run` returns.

pub mod capture;
pub mod config;
pub mod executor;
pub mod policy;
pub mod scope;
pub mod types;

pub use config::SandboxConfig;
pub use executor::{Executor, FORCED_TERMINATION_MESSAGE};
pub use policy::{ScriptPolicy, ValidationError};
pub use scope::TemporaryScope;
pub use types::{ExecutionRequest, ExecutionResult, Language, UnsupportedLanguage, NO_EXIT_CODE};
