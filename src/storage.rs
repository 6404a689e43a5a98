//! Where fetched images end up on disk.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

/// Default directory for saved results: `<data dir>/bluree-cli/results`.
pub fn default_results_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bluree-cli")
        .join("results")
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/bluree-<kind>-<UTC timestamp>.jpg`
    pub fn timestamped_path(&self, kind: &str, at: OffsetDateTime) -> PathBuf {
        let fmt = format_description!("[year][month][day]-[hour][minute][second]");
        let stamp = at
            .to_offset(time::UtcOffset::UTC)
            .format(fmt)
            .unwrap_or_else(|_| at.unix_timestamp().to_string());
        self.dir.join(format!("bluree-{kind}-{stamp}.jpg"))
    }

    /// Write `bytes` to `explicit` if given, otherwise to a fresh timestamped
    /// file in the store directory. Returns the path written.
    pub fn save(&self, kind: &str, bytes: &[u8], explicit: Option<&Path>) -> Result<PathBuf> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => self.unique_path(kind),
        };
        write_bytes(&path, bytes)?;
        Ok(path)
    }

    fn unique_path(&self, kind: &str) -> PathBuf {
        let base = self.timestamped_path(kind, OffsetDateTime::now_utc());
        if !base.exists() {
            return base;
        }
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("bluree-{kind}"));
        (1..)
            .map(|n| self.dir.join(format!("{stem}-{n}.jpg")))
            .find(|p| !p.exists())
            .unwrap_or(base)
    }
}

/// Write bytes to `path`, creating parent directories as needed.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn timestamped_names_are_utc() {
        let store = ResultStore::new("/tmp/results");
        let at = datetime!(2025-02-01 13:04:05 +02:00);
        assert_eq!(
            store.timestamped_path("result", at),
            PathBuf::from("/tmp/results/bluree-result-20250201-110405.jpg")
        );
    }

    #[test]
    fn save_creates_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResultStore::new(tmp.path().join("nested").join("results"));
        let path = store.save("result", b"jpeg", None).unwrap();
        assert!(path.starts_with(store.dir()));
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");
    }

    #[test]
    fn explicit_path_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResultStore::new(tmp.path().join("unused"));
        let target = tmp.path().join("out").join("final.jpg");
        let path = store.save("result", b"abc", Some(&target)).unwrap();
        assert_eq!(path, target);
        assert!(!store.dir().exists());
    }

    #[test]
    fn repeated_saves_do_not_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResultStore::new(tmp.path());
        let first = store.save("annotated", b"one", None).unwrap();
        let second = store.save("annotated", b"two", None).unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
    }
}
