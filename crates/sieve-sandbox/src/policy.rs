//! Pre-execution script policy - denylist model
//!
//! A denylist is trivially bypassed (`getattr(os, "sys" + "tem")`), so this
//! is not the sandbox. It exists to reject the obvious cases before any
//! directory or process is allocated for them. Timeouts and output caps in
//! the executor are what actually bound a run.

use crate::config::SandboxConfig;

/// Reasons a script is rejected before execution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Empty script")]
    Empty,
    #[error("Code exceeds maximum size of {limit} characters ({actual} submitted)")]
    SizeExceeded { limit: usize, actual: usize },
    #[error("Security violation: code contains forbidden pattern '{0}'")]
    SecurityViolation(String),
}

/// Script policy
pub struct ScriptPolicy {
    /// Forbidden substrings, matched case-sensitively anywhere in the source
    denied: Vec<String>,
    /// Maximum source size in characters
    pub max_chars: usize,
}

impl ScriptPolicy {
    pub fn new(denied: Vec<String>, max_chars: usize) -> Self {
        Self { denied, max_chars }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(config.denylist.clone(), config.max_code_chars)
    }

    /// Check a script without touching anything outside this struct.
    ///
    /// Size is checked first so an oversized payload is never scanned.
    pub fn check(&self, code: &str) -> Result<(), ValidationError> {
        if code.trim().is_empty() {
            return Err(ValidationError::Empty);
        }

        // Fast path: byte length is an upper bound on char count
        if code.len() > self.max_chars {
            let actual = code.chars().count();
            if actual > self.max_chars {
                return Err(ValidationError::SizeExceeded {
                    limit: self.max_chars,
                    actual,
                });
            }
        }

        match self.denied.iter().find(|term| code.contains(term.as_str())) {
            Some(term) => Err(ValidationError::SecurityViolation(term.clone())),
            None => Ok(()),
        }
    }
}

impl Default for ScriptPolicy {
    fn default() -> Self {
        Self::from_config(&SandboxConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_scripts_pass() {
        let policy = ScriptPolicy::default();
        assert!(policy.check("print('ok')").is_ok());
        assert!(policy.check("import json\nprint(json.dumps({'a': 1}))").is_ok());
        assert!(policy.check("echo hello").is_ok());
    }

    #[test]
    fn test_denylisted_terms_rejected() {
        let policy = ScriptPolicy::default();
        assert_eq!(
            policy.check("import os\nos.system('rm -rf /tmp/x')"),
            Err(ValidationError::SecurityViolation("rm -rf".to_string()))
        );
        assert!(policy.check("dd if=/dev/zero of=/dev/null").is_err());
        assert!(policy.check("mkfs.ext4 /dev/sda1").is_err());
        assert!(policy.check("sudo apt-get install x").is_err());
        assert!(policy.check(":(){ :|:& };:").is_err());
    }

    #[test]
    fn test_match_inside_string_and_comment() {
        let policy = ScriptPolicy::default();
        assert!(policy.check("msg = \"never run rm -rf here\"\nprint(msg)").is_err());
        assert!(policy.check("print(1)  # mkfs").is_err());
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let policy = ScriptPolicy::default();
        assert!(policy.check("print('RM -RF')").is_ok());
        assert!(policy.check("print('MKFS')").is_ok());
    }

    #[test]
    fn test_empty_rejected() {
        let policy = ScriptPolicy::default();
        assert_eq!(policy.check(""), Err(ValidationError::Empty));
        assert_eq!(policy.check("  \n\t"), Err(ValidationError::Empty));
    }

    #[test]
    fn test_size_limit_in_characters() {
        let policy = ScriptPolicy::new(vec![], 10);
        assert!(policy.check("print(123)").is_ok());
        assert_eq!(
            policy.check("print(1234)"),
            Err(ValidationError::SizeExceeded {
                limit: 10,
                actual: 11
            })
        );
        // 10 chars, 30 bytes
        assert!(policy.check("€€€€€€€€€€").is_ok());
    }

    #[test]
    fn test_size_checked_before_denylist() {
        let policy = ScriptPolicy::new(vec!["rm -rf".to_string()], 8);
        assert!(matches!(
            policy.check("rm -rf / now"),
            Err(ValidationError::SizeExceeded { .. })
        ));
    }

    #[test]
    fn test_empty_denylist() {
        let policy = ScriptPolicy::new(vec![], 100);
        assert!(policy.check("rm -rf /").is_ok());
    }
}
