//! Filesystem collaborator used by the tree walker and content scanner
//!
//! The crawl never touches `std::fs` directly; it goes through the
//! [`Filesystem`] trait so that remote shares, mounted shares and test doubles
//! all look the same. [`LocalFilesystem`] is the default implementation and
//! works for local paths, mounted shares and UNC paths on Windows.

use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[cfg(test)]
pub(crate) mod testing;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub path: PathBuf,
    pub size: u64,
}

/// Immediate children of one directory
///
/// Entries that could not be inspected are reported in `errors` instead of
/// failing the whole listing.
#[derive(Debug, Default)]
pub struct DirListing {
    pub files: Vec<FileMeta>,
    pub dirs: Vec<PathBuf>,
    pub errors: Vec<(PathBuf, io::Error)>,
}

/// Capabilities of the acting principal on one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RwStatus {
    pub can_read: bool,
    pub can_write: bool,
    pub can_modify: bool,
}

impl RwStatus {
    pub fn any(&self) -> bool {
        self.can_read || self.can_write || self.can_modify
    }
}

impl std::fmt::Display for RwStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.can_read { "R" } else { "-" },
            if self.can_write { "W" } else { "-" },
            if self.can_modify { "M" } else { "-" },
        )
    }
}

pub trait Filesystem: Send + Sync {
    fn list_dir(&self, path: &Path) -> io::Result<DirListing>;

    fn metadata(&self, path: &Path) -> io::Result<FileMeta>;

    /// Open a file for shared streamed reading
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    fn probe_access(&self, path: &Path) -> RwStatus;

    /// Read at most `limit + 1` bytes through [`Filesystem::open_read`]
    ///
    /// A result longer than `limit` means the file holds more than `limit`
    /// bytes; the rest is never read.
    fn read_capped(&self, path: &Path, limit: u64) -> io::Result<Vec<u8>> {
        let reader = self.open_read(path)?;
        let mut buffer = Vec::new();
        reader.take(limit.saturating_add(1)).read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn list_dir(&self, path: &Path) -> io::Result<DirListing> {
        let mut listing = DirListing::default();

        for entry in fs::read_dir(path)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    listing.errors.push((path.to_path_buf(), e));
                    continue;
                }
            };
            let entry_path = entry.path();
            let is_link = entry
                .file_type()
                .map(|file_type| file_type.is_symlink())
                .unwrap_or(false);

            // Linked files are classified like real ones; linked directories are never
            // descended, so a link back up the tree cannot loop the walk
            match fs::metadata(&entry_path) {
                Ok(meta) if meta.is_dir() && is_link => {
                    tracing::debug!("Not following directory link {}", entry_path.display());
                }
                Ok(meta) if meta.is_dir() => listing.dirs.push(entry_path),
                Ok(meta) if meta.is_file() => listing.files.push(FileMeta {
                    path: entry_path,
                    size: meta.len(),
                }),
                Ok(_) => {}
                Err(e) => listing.errors.push((entry_path, e)),
            }
        }

        // read_dir order is platform-dependent
        listing.files.sort_by(|a, b| a.path.cmp(&b.path));
        listing.dirs.sort();
        Ok(listing)
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let meta = fs::metadata(path)?;
        Ok(FileMeta {
            path: path.to_path_buf(),
            size: meta.len(),
        })
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(path)?))
    }

    fn probe_access(&self, path: &Path) -> RwStatus {
        let can_read = File::open(path).is_ok();
        // Opening for write without truncate or create leaves the file untouched
        let can_write = OpenOptions::new().write(true).open(path).is_ok();
        let can_modify = fs::metadata(path)
            .map(|meta| !meta.permissions().readonly())
            .unwrap_or(false);

        RwStatus {
            can_read,
            can_write,
            can_modify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_dir_separates_files_and_dirs() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.txt"), "12345").unwrap();
        fs::write(temp.path().join("a.txt"), "1").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();

        let listing = LocalFilesystem.list_dir(temp.path()).unwrap();
        assert_eq!(listing.files.len(), 2);
        assert_eq!(listing.files[0].path, temp.path().join("a.txt"));
        assert_eq!(listing.files[1].size, 5);
        assert_eq!(listing.dirs, vec![temp.path().join("sub")]);
        assert!(listing.errors.is_empty());
    }

    #[test]
    fn test_list_missing_dir_fails() {
        let temp = TempDir::new().unwrap();
        let err = LocalFilesystem
            .list_dir(&temp.path().join("missing"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_probe_access_and_read() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("creds.txt");
        fs::write(&file, "secret").unwrap();

        let rw = LocalFilesystem.probe_access(&file);
        assert!(rw.can_read);
        assert!(rw.any());
        assert_eq!(LocalFilesystem.read_capped(&file, 100).unwrap(), b"secret");
        assert_eq!(LocalFilesystem.read_capped(&file, 3).unwrap(), b"secr");
        // probing for write must not truncate
        assert_eq!(fs::read_to_string(&file).unwrap(), "secret");
    }

    #[test]
    fn test_missing_file_grants_no_access() {
        let temp = TempDir::new().unwrap();
        let rw = LocalFilesystem.probe_access(&temp.path().join("gone"));
        assert!(!rw.any());
        assert_eq!(rw.to_string(), "---");
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_links_are_not_descended() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "1").unwrap();
        fs::write(temp.path().join("target.txt"), "22").unwrap();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(
            temp.path().join("target.txt"),
            temp.path().join("linked.txt"),
        )
        .unwrap();

        let listing = LocalFilesystem.list_dir(temp.path()).unwrap();
        assert!(listing.dirs.is_empty());
        let names: Vec<_> = listing
            .files
            .iter()
            .map(|file| file.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "linked.txt", "target.txt"]);
        assert_eq!(listing.files[1].size, 2);
    }
}
