//! File storage collaborator.

use crate::core::StorageError;

/// Where file bytes come from and go to.
///
/// The sender only calls [`read`](FileStorage::read). The receiver calls
/// [`accept`](FileStorage::accept) once per offered file and then
/// [`write`](FileStorage::write) per chunk. Any error aborts the transfer.
pub trait FileStorage {
    /// Fill `buf` with the file bytes at `offset`.
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Decide whether to receive a file of `len` bytes named `name`.
    fn accept(&mut self, len: u32, name: &str) -> Result<(), StorageError>;

    /// Store `data` at `offset` of the accepted file.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StorageError>;
}

/// In-memory [`FileStorage`].
///
/// Serves reads from a source buffer and collects received bytes into a
/// zero-filled buffer sized on `accept`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    source: Vec<u8>,
    received: Vec<u8>,
    name: Option<String>,
    max_len: Option<u32>,
    write_limit: Option<usize>,
    writes: usize,
}

impl MemoryStorage {
    /// Empty storage that accepts any file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage serving `source` to a sender.
    pub fn with_source(source: impl Into<Vec<u8>>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Reject offered files longer than `max_len`.
    pub fn with_max_len(mut self, max_len: u32) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Fail every write after `limit` successful ones.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Bytes served to the sender.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Bytes received so far.
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Name of the accepted file.
    pub fn file_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl FileStorage for MemoryStorage {
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        let start = offset as usize;
        let end = start + buf.len();
        let src = self.source.get(start..end).ok_or_else(|| {
            StorageError::Rejected(format!("read {start}..{end} beyond {}", self.source.len()))
        })?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn accept(&mut self, len: u32, name: &str) -> Result<(), StorageError> {
        if let Some(max_len) = self.max_len {
            if len > max_len {
                return Err(StorageError::Rejected(format!(
                    "{name}: {len} bytes exceeds {max_len}"
                )));
            }
        }
        self.received = vec![0; len as usize];
        self.name = Some(name.to_owned());
        self.writes = 0;
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StorageError> {
        if self.write_limit.is_some_and(|limit| self.writes >= limit) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "write limit reached",
            )));
        }
        let start = offset as usize;
        let end = start + data.len();
        let len = self.received.len();
        let dst = self.received.get_mut(start..end).ok_or_else(|| {
            StorageError::Rejected(format!("write {start}..{end} beyond {len}"))
        })?;
        dst.copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}
