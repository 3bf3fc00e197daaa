//! Per-run scratch directory
//!
//! Each run gets a uniquely named directory (named by `tempfile`, so
//! concurrent runs never collide) holding the script and, by default, serving
//! as the process cwd. It is removed by `close`, or by `Drop` if the run
//! unwinds before reaching it.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const SCOPE_PREFIX: &str = "sieve-";

pub struct TemporaryScope {
    dir: TempDir,
}

impl TemporaryScope {
    /// Create a fresh scope under `root`
    pub fn create(root: &Path) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(SCOPE_PREFIX)
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "Created execution scope");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the script verbatim and return its path
    pub async fn write_script(&self, name: &str, code: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        tokio::fs::write(&path, code.as_bytes()).await?;
        Ok(path)
    }

    /// Remove the scope recursively. Failures are logged and swallowed.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Removed execution scope"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove execution scope"),
        }
    }
}
