//! Byte sources with positioned reads.
//!
//! Decoders never share a cursor: every read names its own offset, so
//! concurrent `read_data` calls on one source do not interfere.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

use bytes::Bytes;
use cdm_common::CdmResult;

/// Random-access, read-only bytes backing an open file.
pub trait ByteSource: Send + Sync + fmt::Debug {
    /// Human readable location, used in log fields and errors.
    fn location(&self) -> &str;

    /// Current length in bytes. Files may grow between calls.
    fn len(&self) -> CdmResult<u64>;

    /// Fill `buf` from `offset`. Short reads are an `UnexpectedEof` error.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> CdmResult<()>;

    fn is_empty(&self) -> CdmResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Read `len` bytes at `offset` into a new buffer.
    fn read_vec(&self, offset: u64, len: usize) -> CdmResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read at most `max` bytes from the start of the source.
    fn read_prefix(&self, max: usize) -> CdmResult<Vec<u8>> {
        let len = self.len()?.min(max as u64) as usize;
        self.read_vec(0, len)
    }
}

/// An in-memory source.
#[derive(Clone)]
pub struct MemorySource {
    name: String,
    data: Bytes,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySource")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

impl ByteSource for MemorySource {
    fn location(&self) -> &str {
        &self.name
    }

    fn len(&self) -> CdmResult<u64> {
        Ok(self.data.len() as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> CdmResult<()> {
        let start = usize::try_from(offset).map_err(|_| eof(offset, buf.len()))?;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| eof(offset, buf.len()))?;
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }
}

fn eof(offset: u64, len: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("read of {} bytes at offset {} runs past end of data", len, offset),
    )
}

/// A file on local disk.
///
/// On Unix reads use `pread`; elsewhere a per-handle lock serializes each
/// seek and read pair.
#[derive(Debug)]
pub struct FileSource {
    path: String,
    #[cfg(unix)]
    file: File,
    #[cfg(not(unix))]
    file: std::sync::Mutex<File>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> CdmResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(Self {
            path: path.display().to_string(),
            #[cfg(unix)]
            file,
            #[cfg(not(unix))]
            file: std::sync::Mutex::new(file),
        })
    }
}

#[cfg(unix)]
impl ByteSource for FileSource {
    fn location(&self) -> &str {
        &self.path
    }

    fn len(&self) -> CdmResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> CdmResult<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }
}

#[cfg(not(unix))]
impl ByteSource for FileSource {
    fn location(&self) -> &str {
        &self.path
    }

    fn len(&self) -> CdmResult<u64> {
        let file = self.lock()?;
        Ok(file.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> CdmResult<()> {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }
}

#[cfg(not(unix))]
impl FileSource {
    fn lock(&self) -> CdmResult<std::sync::MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "file handle lock poisoned").into())
    }
}
