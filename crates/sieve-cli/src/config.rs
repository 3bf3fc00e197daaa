//! Startup configuration (~/.sieve/config.json)
//!
//! Only where scripts run is configurable. Timeouts, output caps and the
//! denylist are fixed in `sieve_sandbox::config`.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sieve_sandbox::SandboxConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Interpreter binary (default: python3 from PATH)
    #[serde(default)]
    pub interpreter: Option<PathBuf>,
    /// Directory execution scopes are created in (default: system temp dir)
    #[serde(default)]
    pub scope_root: Option<PathBuf>,
}

impl GatewayConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".sieve").join("config.json"))
    }

    /// Load from an explicit path, or from the default path if it exists.
    ///
    /// An explicit path that is missing is an error; a missing default file
    /// just means defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::read(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn sandbox_config(&self) -> SandboxConfig {
        let mut config = SandboxConfig::default();
        if let Some(interpreter) = &self.interpreter {
            config = config.with_interpreter(interpreter);
        }
        if let Some(root) = &self.scope_root {
            config = config.with_scope_root(root);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"interpreter": "/opt/python/bin/python3", "scope_root": "/var/tmp"}"#,
        )
        .unwrap();

        let config = GatewayConfig::load(Some(&path)).unwrap();
        let sandbox = config.sandbox_config();
        assert_eq!(
            sandbox.interpreter,
            Some(PathBuf::from("/opt/python/bin/python3"))
        );
        assert_eq!(sandbox.scope_root, PathBuf::from("/var/tmp"));
        assert_eq!(sandbox.max_output_bytes, 1_000_000);
    }

    #[test]
    fn test_empty_object_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();
        assert_eq!(GatewayConfig::load(Some(&path)).unwrap(), GatewayConfig::default());
    }

    #[test]
    fn test_limits_not_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_timeout_ms": 600000}"#).unwrap();
        assert!(GatewayConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_explicit_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = GatewayConfig::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
