use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use csv::{Terminator, Writer, WriterBuilder};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{COLUMNS, RecordRow};

type LockMap = Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>;

/// Directory of append-only CSV record files.
///
/// Cloning is cheap; clones share the per-file lock table, so appends to one
/// file from the same process never interleave and the header is written
/// exactly once. Nothing is coordinated across processes. The lock table
/// keeps one entry per filename ever written and is never pruned.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
    locks: LockMap,
}

impl RecordStore {
    /// Use `root` as the storage directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: LockMap::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    fn lock_for(&self, filename: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(filename.to_string())
            .or_default()
            .clone()
    }

    /// Append `row` to `filename`, writing the header first when the file
    /// does not exist yet. Returns whether the header was written.
    ///
    /// A failure after the header went out leaves the header in place.
    pub fn append(&self, filename: &str, row: &RecordRow) -> Result<bool, StoreError> {
        let lock = self.lock_for(filename);
        let _guard = lock.lock();

        let path = self.path_for(filename);
        let write_header = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut wtr = record_writer(file);
        if write_header {
            wtr.write_record(COLUMNS)?;
        }
        wtr.write_record(row.fields())?;
        wtr.flush()?;
        debug!(file = %path.display(), write_header, "row appended");
        Ok(write_header)
    }

    /// Create `filename` holding only the header row. An existing file is
    /// left untouched and `false` is returned.
    pub fn init(&self, filename: &str) -> Result<bool, StoreError> {
        let lock = self.lock_for(filename);
        let _guard = lock.lock();

        let path = self.path_for(filename);
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        let mut wtr = record_writer(file);
        wtr.write_record(COLUMNS)?;
        wtr.flush()?;
        Ok(true)
    }

    /// Locate an existing file for download. `requested` must be a plain
    /// relative path; anything reaching outside the root resolves to nothing.
    pub fn resolve(&self, requested: &str) -> Option<PathBuf> {
        let rel = Path::new(requested);
        if requested.is_empty()
            || !rel
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        let path = self.root.join(rel);
        path.is_file().then_some(path)
    }
}

fn record_writer(file: File) -> Writer<File> {
    WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::CRLF)
        .from_writer(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProfileSubmission;
    use chrono::Utc;
    use csv::ReaderBuilder;
    use std::thread;

    fn profile(name: &str) -> ProfileSubmission {
        ProfileSubmission {
            name: name.to_string(),
            email: format!("{name}@example.com"),
            roll: "7".to_string(),
            birthdate: "2004-09-12".to_string(),
            registration: "R-1".to_string(),
            stream: "Commerce".to_string(),
            session: "2022-2025".to_string(),
            year: "3".to_string(),
            course: "Accounts, Finance".to_string(),
        }
    }

    fn row(name: &str) -> RecordRow {
        RecordRow::new(Utc::now().naive_utc(), profile(name))
    }

    fn read_all(path: &Path) -> Vec<Vec<String>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        rdr.records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn open_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("records");
        let store = RecordStore::open(&root).unwrap();
        assert!(root.is_dir());
        // Opening again is harmless.
        RecordStore::open(store.root()).unwrap();
    }

    #[test]
    fn header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();

        assert!(store.append("A.csv", &row("first")).unwrap());
        assert!(!store.append("A.csv", &row("second")).unwrap());

        let rows = read_all(&store.path_for("A.csv"));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], COLUMNS.to_vec());
        assert_eq!(rows[1][1], "first");
        assert_eq!(rows[2][1], "second");
        assert_eq!(rows[2][9], "Accounts, Finance");
    }

    #[test]
    fn rows_end_with_crlf_and_quote_commas() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        store.append("B.csv", &row("x")).unwrap();

        let text = fs::read_to_string(store.path_for("B.csv")).unwrap();
        assert!(text.starts_with("timestamp,name,email,"));
        assert!(text.ends_with(",\"Accounts, Finance\"\r\n"));
    }

    #[test]
    fn quotes_and_newlines_survive_a_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();

        let mut submission = profile("x");
        submission.name = "A \"Q\" B".to_string();
        submission.course = "line1\nline2".to_string();
        store
            .append("G.csv", &RecordRow::new(Utc::now().naive_utc(), submission))
            .unwrap();

        let rows = read_all(&store.path_for("G.csv"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], "A \"Q\" B");
        assert_eq!(rows[1][9], "line1\nline2");
    }

    #[test]
    fn init_creates_header_only_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();

        assert!(store.init("C.csv").unwrap());
        assert_eq!(read_all(&store.path_for("C.csv")), vec![COLUMNS.to_vec()]);

        store.append("C.csv", &row("kept")).unwrap();
        assert!(!store.init("C.csv").unwrap());
        assert_eq!(read_all(&store.path_for("C.csv")).len(), 2);
    }

    #[test]
    fn append_fails_when_root_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("records");
        let store = RecordStore::open(&root).unwrap();
        fs::remove_dir(&root).unwrap();
        fs::write(&root, b"not a directory").unwrap();

        let err = store.append("D.csv", &row("x")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn resolve_stays_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("records")).unwrap();
        store.append("E.csv", &row("x")).unwrap();
        fs::write(dir.path().join("secret.txt"), b"hidden").unwrap();

        assert_eq!(store.resolve("E.csv"), Some(store.path_for("E.csv")));
        assert!(store.resolve("./E.csv").is_some());
        assert!(store.resolve("missing.csv").is_none());
        assert!(store.resolve("../secret.txt").is_none());
        assert!(store.resolve("").is_none());
        let absolute = dir.path().join("secret.txt");
        assert!(store.resolve(absolute.to_str().unwrap()).is_none());
    }

    #[test]
    fn concurrent_first_appends_share_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || store.append("F.csv", &row(&format!("s{i}"))).unwrap())
            })
            .collect();
        let headers_written = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|wrote| *wrote)
            .count();
        assert_eq!(headers_written, 1);

        let rows = read_all(&store.path_for("F.csv"));
        assert_eq!(rows.len(), 17);
        assert_eq!(rows.iter().filter(|r| r[0] == "timestamp").count(), 1);
        assert!(rows.iter().all(|r| r.len() == COLUMNS.len()));
    }
}
