//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::StorageResult;
use parking_lot::RwLock;

/// An in-memory log.
///
/// Suitable for unit tests, integration tests and servers that do not need
/// profiles to survive a restart.
///
/// # Example
///
/// ```rust
/// use prefsync_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"record").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 6);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with `data`.
    ///
    /// Useful for replaying hand-crafted or torn logs in tests.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        Ok(self.data.read().clone())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn replace(&mut self, new_data: &[u8]) -> StorageResult<()> {
        *self.data.write() = new_data.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(backend.read_all().unwrap().is_empty());
    }

    #[test]
    fn memory_append_returns_offsets() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"abc").unwrap(), 0);
        assert_eq!(backend.append(b"de").unwrap(), 3);
        assert_eq!(backend.read_all().unwrap(), b"abcde");
    }

    #[test]
    fn memory_replace_discards_old_contents() {
        let mut backend = InMemoryBackend::with_data(b"old old old".to_vec());
        backend.replace(b"new").unwrap();
        assert_eq!(backend.read_all().unwrap(), b"new");

        backend.append(b"!").unwrap();
        assert_eq!(backend.size().unwrap(), 4);
    }

    #[test]
    fn memory_flush_and_sync_succeed() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"data").unwrap();
        assert!(backend.flush().is_ok());
        assert!(backend.sync().is_ok());
    }

    proptest! {
        #[test]
        fn memory_read_all_is_concatenation(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 0..16)) {
            let mut backend = InMemoryBackend::new();
            let mut expected = Vec::new();
            for chunk in &chunks {
                let offset = backend.append(chunk).unwrap();
                prop_assert_eq!(offset, expected.len() as u64);
                expected.extend_from_slice(chunk);
            }
            prop_assert_eq!(backend.read_all().unwrap(), expected);
        }
    }
}
