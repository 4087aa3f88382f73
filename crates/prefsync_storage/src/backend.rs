//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level append-only log.
///
/// Backends are **opaque byte stores**. The profile store above them owns
/// the record format; a backend only promises that bytes come back exactly
/// as they were appended.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_all` returns every byte appended since the last `replace`
/// - `sync` makes all appended data durable
/// - `replace` is all-or-nothing: readers see either the old or the new contents
pub trait StorageBackend: Send + Sync {
    /// Reads the full contents of the log.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_all(&self) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the log.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Returns the current size of the log in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Atomically replaces the entire log with `data`.
    ///
    /// Used to compact the log down to its live records.
    ///
    /// # Errors
    ///
    /// Returns an error if the new contents cannot be written. On error the
    /// previous contents are left in place.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;
}
