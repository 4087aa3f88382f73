//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A file-based log.
///
/// Data survives process restarts. A sibling `<name>.lock` file is held with
/// an exclusive advisory lock for the lifetime of the backend, so a second
/// process opening the same log gets [`StorageError::Locked`].
///
/// # Durability
///
/// - `flush()` pushes data to the OS
/// - `sync()` calls `File::sync_all()`
/// - `replace()` writes a temp file in the same directory, syncs it and
///   renames it over the log
///
/// # Example
///
/// ```no_run
/// use prefsync_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("profiles.log")).unwrap();
/// backend.append(b"persistent data").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
    _lock: File,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another process holds the log, or
    /// an I/O error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let lock_path = lock_path_for(path);
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked { path: lock_path });
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(size),
            _lock: lock,
        })
    }

    /// Opens or creates a file backend, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// A file that can be cut back to a given length.
trait Truncate {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Writes `data` at `offset`. A write that fails part way is cut back off,
/// so the log never keeps a partial frame in front of later appends.
///
/// If the cut fails too, the next append still starts at `offset` and
/// overwrites the partial bytes.
fn write_at<F: Write + Seek + Truncate>(file: &mut F, offset: u64, data: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    if let Err(e) = file.write_all(data) {
        // the write error is the one worth reporting
        let _ = file.truncate_to(offset);
        return Err(e);
    }
    Ok(())
}

impl StorageBackend for FileBackend {
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(0))?;

        let mut buffer = Vec::with_capacity(size as usize);
        (&mut *file).take(size).read_to_end(&mut buffer)?;

        if (buffer.len() as u64) < size {
            return Err(StorageError::Corrupted(format!(
                "log shrank underneath us: expected {} bytes, read {}",
                size,
                buffer.len()
            )));
        }

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if data.is_empty() {
            return Ok(*self.size.read());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        let offset = *size;
        write_at(&mut *file, offset, data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.write().flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.write().sync_all()?;
        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;

        let mut file = self.file.write();
        let mut size = self.size.write();

        let replaced = temp.persist(&self.path).map_err(|e| e.error)?;
        *file = replaced;
        *size = data.len() as u64;

        Ok(())
    }
}
