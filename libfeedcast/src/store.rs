//! Durable record of announced titles
//!
//! The record is a plain UTF-8 text file with one title per line. It is only
//! ever appended to; the file is the single source of truth for "already
//! announced", so the in-memory index is rebuilt from it on [`EntryStore::refresh`].
//!
//! A blank line is the record of the empty title: feed entries without a
//! title are deduplicated like any other.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Normalize a title to the form used for lookups and storage
///
/// Surrounding whitespace is dropped, which also strips the line terminator
/// (`\n` or `\r\n`) of a stored line. Line breaks inside the title become a
/// single space so every title fits on one line of the store; two titles
/// differing only in how they break lines count as the same title.
pub fn normalize_title(title: &str) -> Cow<'_, str> {
    let title = title.trim();
    if !title.contains(['\n', '\r']) {
        return Cow::Borrowed(title);
    }

    let joined = title
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Cow::Owned(joined)
}

/// Append-only set of announced titles
pub trait EntryStore: Send + Sync {
    /// Whether `title` has been recorded
    fn contains(&self, title: &str) -> Result<bool>;

    /// Durably record `title`; returns once the write reached the disk
    fn append(&mut self, title: &str) -> Result<()>;

    /// Re-read the backing storage
    fn refresh(&mut self) -> Result<()>;

    /// Number of recorded titles
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// File-backed title store
#[derive(Debug)]
pub struct TitleStore {
    path: PathBuf,
    titles: HashSet<String>,
    count: usize,
}

impl TitleStore {
    /// Open the store at `path`, creating an empty file if none exists
    ///
    /// Opening an existing store never modifies it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Open {
                path: path.display().to_string(),
                source,
            })?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StoreError::Open {
                path: path.display().to_string(),
                source,
            })?;

        let mut store = Self {
            path,
            titles: HashSet::new(),
            count: 0,
        };
        store.refresh()?;

        debug!(path = %store.path.display(), titles = store.count, "opened title store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_for_append(&self) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.write_error(source).into())
    }

    /// Whether the file ends mid-line (a write was cut off after its title)
    fn ends_mid_line(file: &mut File) -> std::io::Result<bool> {
        if file.metadata()?.len() == 0 {
            return Ok(false);
        }
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        Ok(last[0] != b'\n')
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl EntryStore for TitleStore {
    fn contains(&self, title: &str) -> Result<bool> {
        Ok(self.titles.contains(normalize_title(title).as_ref()))
    }

    fn append(&mut self, title: &str) -> Result<()> {
        let title = normalize_title(title);
        if self.titles.contains(title.as_ref()) {
            return Ok(());
        }

        if title.is_empty() {
            warn!("recording an entry without a title; later untitled entries will be skipped");
        }

        let mut file = self.open_for_append()?;
        if Self::ends_mid_line(&mut file).map_err(|e| self.write_error(e))? {
            writeln!(file).map_err(|e| self.write_error(e))?;
        }
        writeln!(file, "{}", title).map_err(|e| self.write_error(e))?;
        file.sync_all().map_err(|e| self.write_error(e))?;

        self.titles.insert(title.into_owned());
        self.count += 1;
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Read {
            path: self.path.display().to_string(),
            source,
        })?;

        self.titles.clear();
        self.count = 0;
        for line in content.lines() {
            if self.titles.insert(normalize_title(line).into_owned()) {
                self.count += 1;
            }
        }

        Ok(())
    }

    fn len(&self) -> usize {
        self.count
    }
}

/// In-memory store for tests and dry runs
///
/// Clones share the same titles and failure switch, so a test can keep a
/// handle after moving the store into a [`crate::Bot`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    titles: Arc<std::sync::Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `titles`
    pub fn with_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let store = Self::new();
        if let Ok(mut recorded) = store.titles.lock() {
            recorded.extend(titles.into_iter().map(|t| normalize_title(t.as_ref()).into_owned()));
        }
        store
    }

    /// Make every subsequent operation fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Recorded titles in append order
    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".to_string()).into());
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<String>>> {
        self.titles
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()).into())
    }
}

impl EntryStore for MemoryStore {
    fn contains(&self, title: &str) -> Result<bool> {
        self.check()?;
        let title = normalize_title(title);
        Ok(self.lock()?.iter().any(|t| *t == title))
    }

    fn append(&mut self, title: &str) -> Result<()> {
        self.check()?;
        let title = normalize_title(title);
        let mut titles = self.lock()?;
        if !titles.iter().any(|t| *t == title) {
            titles.push(title.into_owned());
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.check()
    }

    fn len(&self) -> usize {
        self.titles.lock().map(|t| t.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedcastError;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, TitleStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = TitleStore::open(temp_dir.path().join("titles.txt")).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_open_creates_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("titles.txt");

        let store = TitleStore::open(&path).unwrap();

        assert!(path.exists());
        assert!(store.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_append_then_contains() {
        let (_temp_dir, mut store) = temp_store();

        store.append("New Thing").unwrap();

        assert!(store.contains("New Thing").unwrap());
        assert!(!store.contains("Other Thing").unwrap());
        assert!(!store.contains("New Thin").unwrap());
        assert!(!store.contains("new thing").unwrap());
    }

    #[test]
    fn test_append_writes_one_line_per_title() {
        let (_temp_dir, mut store) = temp_store();

        store.append("First").unwrap();
        store.append("Second").unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "First\nSecond\n");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_append_is_not_duplicated() {
        let (_temp_dir, mut store) = temp_store();

        store.append("Same").unwrap();
        store.append("Same").unwrap();
        store.append("  Same \n").unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "Same\n");
    }

    #[test]
    fn test_whitespace_normalization() {
        let (_temp_dir, mut store) = temp_store();

        store.append("  Padded title\n").unwrap();

        assert!(store.contains("Padded title").unwrap());
        assert!(store.contains("Padded title\n").unwrap());
        assert!(store.contains(" Padded title ").unwrap());
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("titles.txt");

        {
            let mut store = TitleStore::open(&path).unwrap();
            store.append("Alpha").unwrap();
            store.append("Beta").unwrap();
        }

        for _ in 0..3 {
            let store = TitleStore::open(&path).unwrap();
            assert_eq!(store.len(), 2);
            assert!(store.contains("Alpha").unwrap());
            assert!(store.contains("Beta").unwrap());
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Alpha\nBeta\n");
    }

    #[test]
    fn test_reads_existing_file_with_crlf() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("titles.txt");
        std::fs::write(&path, "Alpha\r\nBeta\r\n").unwrap();

        let store = TitleStore::open(&path).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.contains("Alpha").unwrap());
        assert!(store.contains("Beta").unwrap());
        assert!(!store.contains("").unwrap());
    }

    #[test]
    fn test_blank_line_records_empty_title() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("titles.txt");
        std::fs::write(&path, "Alpha\r\n\r\nBeta\n").unwrap();

        let store = TitleStore::open(&path).unwrap();

        assert_eq!(store.len(), 3);
        assert!(store.contains("").unwrap());
        assert!(store.contains("   ").unwrap());
    }

    #[test]
    fn test_empty_title_survives_refresh() {
        let (_temp_dir, mut store) = temp_store();

        store.append("").unwrap();
        store.refresh().unwrap();

        assert!(store.contains("").unwrap());
        assert!(store.contains(" \t").unwrap());

        store.append("  ").unwrap();
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "\n");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_embedded_line_breaks_stay_on_one_line() {
        let (_temp_dir, mut store) = temp_store();

        store.append("Line one\nline two").unwrap();
        store.refresh().unwrap();

        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "Line one line two\n");
        assert_eq!(store.len(), 1);
        assert!(store.contains("Line one\nline two").unwrap());
        assert!(store.contains("Line one\r\nline two").unwrap());
        assert!(!store.contains("line two").unwrap());
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Padded \n"), "Padded");
        assert_eq!(normalize_title("a\r\n\r\nb"), "a b");
        assert_eq!(normalize_title(" \r\n "), "");
        assert!(matches!(normalize_title("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn test_refresh_sees_lines_written_elsewhere() {
        let (_temp_dir, mut store) = temp_store();
        store.append("Ours").unwrap();

        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        writeln!(file, "Theirs").unwrap();

        assert!(!store.contains("Theirs").unwrap());
        store.refresh().unwrap();
        assert!(store.contains("Theirs").unwrap());
        assert!(store.contains("Ours").unwrap());
    }

    #[test]
    fn test_append_after_unterminated_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("titles.txt");
        std::fs::write(&path, "Alpha").unwrap();

        let mut store = TitleStore::open(&path).unwrap();
        store.append("Beta").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Alpha\nBeta\n");
    }

    #[test]
    fn test_refresh_fails_when_file_removed() {
        let (_temp_dir, mut store) = temp_store();
        std::fs::remove_file(store.path()).unwrap();

        let result = store.refresh();
        assert!(matches!(
            result,
            Err(FeedcastError::Store(StoreError::Read { .. }))
        ));
    }

    #[test]
    fn test_open_fails_on_directory() {
        let temp_dir = TempDir::new().unwrap();

        let result = TitleStore::open(temp_dir.path());
        assert!(matches!(
            result,
            Err(FeedcastError::Store(StoreError::Open { .. }))
        ));
    }

    #[test]
    fn test_memory_store_shared_between_clones() {
        let handle = MemoryStore::with_titles(["Seen"]);
        let mut store = handle.clone();

        store.append("Fresh").unwrap();

        assert_eq!(handle.titles(), vec!["Seen", "Fresh"]);
        assert!(handle.contains("Fresh").unwrap());
    }

    #[test]
    fn test_memory_store_failure_switch() {
        let mut store = MemoryStore::new();
        store.set_failing(true);

        assert!(store.contains("x").is_err());
        assert!(store.append("x").is_err());
        assert!(store.refresh().is_err());

        store.set_failing(false);
        assert!(store.append("x").is_ok());
    }
}
