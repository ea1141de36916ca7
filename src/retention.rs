//! Start-up cleanup of old reports and recordings

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Outcome of one cleanup run
#[derive(Debug, Default)]
pub struct CleanupStats {
    pub removed: Vec<PathBuf>,
    /// Files that could not be deleted, with the reason
    pub failed: Vec<(PathBuf, std::io::Error)>,
}

/// Keep the `keep` most recently modified files of each directory and delete
/// the rest. Missing directories are skipped and subdirectories are left
/// alone. Deletion failures are collected, never raised.
pub fn cleanup_files_by_count<P: AsRef<Path>>(dirs: &[P], keep: usize) -> CleanupStats {
    let mut stats = CleanupStats::default();

    for dir in dirs {
        let dir = dir.as_ref();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::warn!("Could not read {:?}: {}", dir, e);
                continue;
            }
        };

        let mut files: Vec<(SystemTime, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                if !metadata.is_file() {
                    return None;
                }
                let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                Some((modified, entry.path()))
            })
            .collect();

        // Newest first
        files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        for (_, path) in files.into_iter().skip(keep) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!("Removed old file {:?}", path);
                    stats.removed.push(path);
                }
                Err(e) => {
                    tracing::warn!("Error removing {:?}: {}", path, e);
                    stats.failed.push((path, e));
                }
            }
        }
    }

    if !stats.removed.is_empty() {
        tracing::info!("Cleanup removed {} old files", stats.removed.len());
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs)).unwrap();
        path
    }

    #[test]
    fn test_keeps_newest_files() {
        let dir = tempfile::tempdir().unwrap();
        // file_00 is the newest, file_14 the oldest
        let paths: Vec<_> = (0..15)
            .map(|i| touch(dir.path(), &format!("file_{:02}.html", i), 100 + i * 60))
            .collect();

        let stats = cleanup_files_by_count(&[dir.path()], 10);

        assert_eq!(stats.removed.len(), 5);
        assert!(stats.failed.is_empty());
        for (i, path) in paths.iter().enumerate() {
            assert_eq!(path.exists(), i < 10, "{:?}", path);
        }
    }

    #[test]
    fn test_missing_dir_and_subdirectories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        touch(dir.path(), "a.mp4", 10);
        touch(dir.path(), "b.mp4", 20);

        let stats = cleanup_files_by_count(&[dir.path().join("missing"), dir.path().to_path_buf()], 1);

        assert_eq!(stats.removed, vec![dir.path().join("b.mp4")]);
        assert!(dir.path().join("nested").is_dir());
        assert!(dir.path().join("a.mp4").exists());
    }

    #[test]
    fn test_fewer_files_than_limit_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "only.html", 5);

        let stats = cleanup_files_by_count(&[dir.path()], 10);
        assert!(stats.removed.is_empty());
    }
}
