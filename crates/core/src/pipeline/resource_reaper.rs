use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

#[derive(Error, Debug)]
#[error("failed to remove {path}: {source}")]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Default)]
pub struct ReapReport {
    pub removed: usize,
    pub failures: Vec<CleanupError>,
}

/// Registry of temporary files owned by one pipeline run.
///
/// Paths are registered before the file is created, so a crash mid-write
/// still leaves the file tracked. `reap` deletes each registered path at
/// most once; later calls only see paths registered since. Dropping the
/// reaper reaps whatever is left.
#[derive(Debug, Default)]
pub struct ResourceReaper {
    registered: Mutex<Vec<PathBuf>>,
}

impl ResourceReaper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: impl Into<PathBuf>) {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.into());
    }

    pub fn registered(&self) -> Vec<PathBuf> {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deletes one file right away, leaving its registration in place.
    /// A file that is already gone counts as removed.
    pub fn discard(&self, path: &Path) -> Result<(), CleanupError> {
        remove(path).map(|_| ())
    }

    /// Best-effort deletion of every registered path. Failures are logged
    /// and returned in the report, never raised.
    pub fn reap(&self) -> ReapReport {
        let paths = std::mem::take(
            &mut *self
                .registered
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let mut report = ReapReport::default();
        for path in paths {
            match remove(&path) {
                Ok(true) => report.removed += 1,
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Error deleting file: {e}");
                    report.failures.push(e);
                }
            }
        }
        report
    }
}

impl Drop for ResourceReaper {
    fn drop(&mut self) {
        self.reap();
    }
}

/// Returns `Ok(false)` when the file did not exist.
fn remove(path: &Path) -> Result<bool, CleanupError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(CleanupError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_reap_removes_registered_files() {
        let tmp = TempDir::new().unwrap();
        let reaper = ResourceReaper::new();
        let a = touch(tmp.path(), "a.flac");
        let b = touch(tmp.path(), "b.flac");
        reaper.register(&a);
        reaper.register(&b);

        let report = reaper.reap();
        assert_eq!(report.removed, 2);
        assert!(report.failures.is_empty());
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn test_reap_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let reaper = ResourceReaper::new();
        reaper.register(touch(tmp.path(), "a.flac"));

        assert_eq!(reaper.reap().removed, 1);
        let second = reaper.reap();
        assert_eq!(second.removed, 0);
        assert!(second.failures.is_empty());
        assert!(reaper.registered().is_empty());
    }

    #[test]
    fn test_missing_files_are_not_failures() {
        let tmp = TempDir::new().unwrap();
        let reaper = ResourceReaper::new();
        reaper.register(tmp.path().join("never-created.flac"));

        let report = reaper.reap();
        assert_eq!(report.removed, 0);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_undeletable_path_is_reported_not_raised() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a-directory");
        fs::create_dir(&dir).unwrap();
        let file = touch(tmp.path(), "ok.flac");

        let reaper = ResourceReaper::new();
        reaper.register(&dir);
        reaper.register(&file);

        let report = reaper.reap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, dir);
        assert!(!file.exists());
    }

    #[test]
    fn test_drop_reaps_remaining_files() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "left-behind.flac");
        {
            let reaper = ResourceReaper::new();
            reaper.register(&path);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_discard_keeps_registration() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "partial.flac");
        let reaper = ResourceReaper::new();
        reaper.register(&path);

        reaper.discard(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(reaper.registered(), vec![path]);
        assert!(reaper.discard(&tmp.path().join("gone.flac")).is_ok());
    }
}
