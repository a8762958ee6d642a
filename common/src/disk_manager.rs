//! Manages the segment files of append-only relations on disk.
use crate::api::{RelationId, SegmentNumber, MAX_SEGMENTS_PER_COLUMN};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt; // Using positioned I/O for better concurrency
use std::path::{Path, PathBuf};
use tracing::debug;

/// Names one physical file of a relation.
///
/// Row relations store everything in column 0. Columnar relations store each
/// column in its own file, numbered `column * MAX_SEGMENTS_PER_COLUMN + segno`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileNumber {
    pub segno: SegmentNumber,
    pub column: u32,
}

impl FileNumber {
    pub fn new(segno: SegmentNumber, column: u32) -> Self {
        Self { segno, column }
    }

    pub fn physical(&self) -> u32 {
        self.column * MAX_SEGMENTS_PER_COLUMN + self.segno
    }
}

/// Resolves relation files inside one data directory.
#[derive(Debug)]
pub struct DiskManager {
    data_dir: PathBuf,
}

impl DiskManager {
    /// Creates a new DiskManager rooted at `data_dir`, creating the directory if needed.
    pub fn new(data_dir: impl AsRef<Path>) -> io::Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the path of a relation file. Physical file 0 carries no suffix.
    pub fn file_path(&self, rel_id: RelationId, file: FileNumber) -> PathBuf {
        match file.physical() {
            0 => self.data_dir.join(rel_id.to_string()),
            n => self.data_dir.join(format!("{}.{}", rel_id, n)),
        }
    }

    /// Opens a relation file for appending, creating it when missing.
    pub fn open_for_append(&self, rel_id: RelationId, file: FileNumber) -> io::Result<SegmentFile> {
        let path = self.file_path(rel_id, file);
        let handle = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        Ok(SegmentFile { file: handle, path })
    }

    /// Opens a relation file for a sequential scan.
    pub fn open_for_scan(&self, rel_id: RelationId, file: FileNumber) -> io::Result<SegmentFile> {
        let path = self.file_path(rel_id, file);
        let handle = File::open(&path)?;
        advise_sequential(&handle);
        Ok(SegmentFile { file: handle, path })
    }

    /// Removes every file belonging to a relation. Missing files are ignored.
    pub fn remove_relation_files(&self, rel_id: RelationId) -> io::Result<()> {
        let prefix = rel_id.to_string();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let belongs = name == prefix.as_str()
                || name
                    .strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()));
            if belongs {
                debug!(path = %entry.path().display(), "removing relation file");
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn advise_sequential(file: &File) {
    use std::os::fd::AsRawFd;
    // SAFETY: the descriptor is valid for the lifetime of `file`; the call only
    // passes a readahead hint to the kernel.
    let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL) };
    if rc != 0 {
        debug!(rc, "posix_fadvise failed");
    }
}

#[cfg(not(target_os = "linux"))]
fn advise_sequential(_file: &File) {}

/// One open relation file. Reads and writes are positioned, so the logical end
/// of file is owned by the caller (the segment file catalog), not by the OS.
#[derive(Debug)]
pub struct SegmentFile {
    file: File,
    path: PathBuf,
}

impl SegmentFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads exactly `data.len()` bytes at `offset`.
    pub fn read_at(&self, offset: u64, data: &mut [u8]) -> io::Result<()> {
        self.file.read_exact_at(data, offset)
    }

    /// Writes all of `data` at `offset`.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.write_all_at(data, offset)
    }

    /// Flushes written data to stable storage.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_data()
    }

    /// The physical length of the file, which may exceed the committed end of file.
    pub fn physical_len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_naming() {
        let dir = tempfile::tempdir().unwrap();
        let disk_manager = DiskManager::new(dir.path()).unwrap();
        assert_eq!(
            disk_manager.file_path(42, FileNumber::new(0, 0)),
            dir.path().join("42")
        );
        assert_eq!(
            disk_manager.file_path(42, FileNumber::new(1, 0)),
            dir.path().join("42.1")
        );
        assert_eq!(
            disk_manager.file_path(42, FileNumber::new(1, 2)),
            dir.path().join("42.257")
        );
    }

    #[test]
    fn test_segment_file_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let disk_manager = DiskManager::new(dir.path()).unwrap();
        let file = disk_manager
            .open_for_append(7, FileNumber::new(1, 0))
            .unwrap();
        file.write_at(0, b"hello").unwrap();
        file.write_at(5, b" world").unwrap();
        drop(file);

        let file = disk_manager.open_for_scan(7, FileNumber::new(1, 0)).unwrap();
        let mut data = [0u8; 11];
        file.read_at(0, &mut data).unwrap();
        assert_eq!(&data, b"hello world");
        assert_eq!(file.physical_len().unwrap(), 11);
    }

    #[test]
    fn test_remove_relation_files() {
        let dir = tempfile::tempdir().unwrap();
        let disk_manager = DiskManager::new(dir.path()).unwrap();
        disk_manager.open_for_append(3, FileNumber::new(0, 0)).unwrap();
        disk_manager.open_for_append(3, FileNumber::new(1, 1)).unwrap();
        disk_manager.open_for_append(33, FileNumber::new(1, 0)).unwrap();

        disk_manager.remove_relation_files(3).unwrap();
        assert!(!disk_manager.file_path(3, FileNumber::new(0, 0)).exists());
        assert!(!disk_manager.file_path(3, FileNumber::new(1, 1)).exists());
        assert!(disk_manager.file_path(33, FileNumber::new(1, 0)).exists());
    }
}
