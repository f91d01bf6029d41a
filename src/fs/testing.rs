//! In-memory filesystem double for unit tests

use super::{DirListing, FileMeta, Filesystem, RwStatus};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct MemoryFilesystem {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    read_failures: Mutex<HashMap<PathBuf, VecDeque<io::Error>>>,
    access: Option<RwStatus>,
    reads: AtomicUsize,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if dir.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(dir.to_path_buf());
            parent = dir.parent();
        }
        self.files.insert(path, content.into());
        self
    }

    /// Make the next reads of `path` fail with these errors, in order
    pub fn failing_reads(self, path: impl Into<PathBuf>, errors: Vec<io::Error>) -> Self {
        if let Ok(mut failures) = self.read_failures.lock() {
            failures.insert(path.into(), errors.into());
        }
        self
    }

    pub fn with_access(mut self, access: RwStatus) -> Self {
        self.access = Some(access);
        self
    }

    /// Number of `open_read` calls so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Filesystem for MemoryFilesystem {
    fn list_dir(&self, path: &Path) -> io::Result<DirListing> {
        if !self.dirs.contains(path) {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }

        let mut listing = DirListing::default();
        for (file, content) in &self.files {
            if file.parent() == Some(path) {
                listing.files.push(FileMeta {
                    path: file.clone(),
                    size: content.len() as u64,
                });
            }
        }
        for dir in &self.dirs {
            if dir.parent() == Some(path) {
                listing.dirs.push(dir.clone());
            }
        }
        Ok(listing)
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let content = self
            .files
            .get(path)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        Ok(FileMeta {
            path: path.to_path_buf(),
            size: content.len() as u64,
        })
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .read_failures
            .lock()
            .ok()
            .and_then(|mut failures| failures.get_mut(path).and_then(|queue| queue.pop_front()));
        if let Some(error) = scripted {
            return Err(error);
        }

        let content = self
            .files
            .get(path)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        Ok(Box::new(io::Cursor::new(content.clone())))
    }

    fn probe_access(&self, path: &Path) -> RwStatus {
        self.access.unwrap_or(RwStatus {
            can_read: self.files.contains_key(path),
            can_write: false,
            can_modify: false,
        })
    }
}
