//! Scoped temporary-file ownership for engine exchanges.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Owns a uniquely named path under the system temp directory and removes
/// the file when dropped, on every exit path.
///
/// Uniqueness comes from the process id plus a random 64-bit suffix, so
/// concurrent invocations never collide. Removal is best-effort: a missing
/// file is not an error (the file may never have been created), and any
/// other failure is logged and swallowed.
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    /// Reserve a unique path like `metapool_<tag>_<pid>_<rand>.<ext>`.
    /// The file itself is not created.
    pub fn new(tag: &str, extension: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "metapool_{tag}_{}_{:016x}.{extension}",
            std::process::id(),
            fastrand::u64(..)
        ));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "temp file cleanup failed");
            }
        }
    }
}
