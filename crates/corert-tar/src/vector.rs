use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One segment of a [`crate::TarVec`] concatenation (spec.md §4.14): a
/// fixed byte range that knows its own size and can lazily open a reader
/// starting at a given local offset within that range.
pub trait Vector: Send + Sync {
    fn size(&self) -> i64;

    /// Opens a reader positioned `offset` bytes into this vector
    /// (`0 <= offset <= size()`). Closing is just dropping the reader.
    fn open(&self, offset: i64) -> io::Result<Box<dyn Read + Send>>;
}

/// An in-memory byte vector.
pub struct MemVector {
    bytes: Arc<[u8]>,
}

impl MemVector {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        MemVector { bytes: bytes.into() }
    }
}

impl Vector for MemVector {
    fn size(&self) -> i64 {
        self.bytes.len() as i64
    }

    fn open(&self, offset: i64) -> io::Result<Box<dyn Read + Send>> {
        let mut cursor = Cursor::new(self.bytes.clone());
        cursor.set_position(offset.max(0) as u64);
        Ok(Box::new(cursor))
    }
}

/// `n` zero bytes, used to pad a tar entry up to a 512-byte block boundary.
pub struct PaddingVector {
    len: i64,
}

impl PaddingVector {
    pub fn new(len: i64) -> Self {
        PaddingVector { len: len.max(0) }
    }
}

impl Vector for PaddingVector {
    fn size(&self) -> i64 {
        self.len
    }

    fn open(&self, offset: i64) -> io::Result<Box<dyn Read + Send>> {
        let remaining = (self.len - offset.max(0)).max(0) as u64;
        Ok(Box::new(io::repeat(0).take(remaining)))
    }
}

/// A byte range of a file on disk, opened lazily (and only for as long as
/// it takes to read it) so a `TarVec` over many large files never holds
/// more than one file descriptor at a time.
pub struct FileVector {
    path: PathBuf,
    start: u64,
    len: u64,
}

impl FileVector {
    pub fn new(path: impl Into<PathBuf>, start: u64, len: u64) -> Self {
        FileVector { path: path.into(), start, len }
    }

    /// A `FileVector` covering the whole file at `path`.
    pub fn whole_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = std::fs::metadata(&path)?.len();
        Ok(FileVector { path, start: 0, len })
    }
}

impl Vector for FileVector {
    fn size(&self) -> i64 {
        self.len as i64
    }

    fn open(&self, offset: i64) -> io::Result<Box<dyn Read + Send>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.start + offset.max(0) as u64))?;
        let remaining = (self.len as i64 - offset.max(0)).max(0) as u64;
        Ok(Box::new(file.take(remaining)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn mem_vector_reports_its_length_and_reads_from_an_offset() {
        let v = MemVector::new(*b"hello world");
        assert_eq!(v.size(), 11);
        let mut reader = v.open(6).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "world");
    }

    #[test]
    fn padding_vector_yields_zero_bytes() {
        let v = PaddingVector::new(4);
        let mut reader = v.open(0).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![0u8; 4]);
    }

    #[test]
    fn padding_vector_open_at_an_offset_yields_the_remainder() {
        let v = PaddingVector::new(4);
        let mut reader = v.open(3).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![0u8; 1]);
    }

    #[test]
    fn file_vector_reads_a_byte_range_lazily() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"0123456789").unwrap();
        let v = FileVector::new(tmp.path(), 2, 5);
        assert_eq!(v.size(), 5);
        let mut out = Vec::new();
        v.open(0).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"23456");
    }
}
