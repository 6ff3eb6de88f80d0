use std::io::{self, Read, Seek, SeekFrom};

use crate::vector::Vector;

/// Lazy virtual concatenation of [`Vector`]s as a single `Read + Seek`
/// (spec.md §4.14): `size()` is the sum of each vector's size, and
/// reading end-to-end yields exactly the concatenation of each vector's
/// own bytes. At most one vector is open at a time.
pub struct TarVec {
    vectors: Vec<Box<dyn Vector>>,
    /// Cumulative exclusive end offset of each vector, e.g. `[3, 3, 10]`
    /// for sizes `[3, 0, 7]`.
    ends: Vec<i64>,
    total: i64,
    pos: i64,
    open: Option<(usize, Box<dyn Read + Send>)>,
}

impl TarVec {
    pub fn new(vectors: Vec<Box<dyn Vector>>) -> Self {
        let mut ends = Vec::with_capacity(vectors.len());
        let mut total = 0i64;
        for v in &vectors {
            total += v.size();
            ends.push(total);
        }
        TarVec { vectors, ends, total, pos: 0, open: None }
    }

    pub fn size(&self) -> i64 {
        self.total
    }

    pub fn position(&self) -> i64 {
        self.pos
    }

    /// Closes any currently open vector without changing position.
    pub fn close(&mut self) {
        self.open = None;
    }

    /// Index of the vector containing `pos`, given `0 <= pos < total`.
    fn locate(&self, pos: i64) -> usize {
        self.ends.partition_point(|&end| end <= pos)
    }

    fn start_of(&self, idx: usize) -> i64 {
        if idx == 0 {
            0
        } else {
            self.ends[idx - 1]
        }
    }
}

impl Read for TarVec {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos < self.total {
            let idx = self.locate(self.pos);
            let start = self.start_of(idx);

            if self.open.as_ref().map(|(open_idx, _)| *open_idx) != Some(idx) {
                let reader = self.vectors[idx].open(self.pos - start)?;
                self.open = Some((idx, reader));
            }

            let (_, reader) = self.open.as_mut().expect("just set");
            let n = reader.read(buf)?;
            if n > 0 {
                self.pos += n as i64;
                return Ok(n);
            }
            // This vector's reader is exhausted exactly at its declared
            // size; move on to the next one without returning (0, Ok).
            self.open = None;
        }
        Ok(0)
    }
}

impl Seek for TarVec {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => self.pos + offset,
            SeekFrom::End(offset) => self.total + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position"));
        }
        if new_pos != self.pos {
            self.open = None;
        }
        self.pos = new_pos;
        Ok(self.pos as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{FileVector, MemVector, PaddingVector};
    use std::io::Write;

    fn read_all(v: &mut TarVec) -> Vec<u8> {
        let mut out = Vec::new();
        v.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn size_is_the_sum_of_its_vectors() {
        let v = TarVec::new(vec![Box::new(MemVector::new(*b"abc")), Box::new(PaddingVector::new(5)), Box::new(MemVector::new(*b"xy"))]);
        assert_eq!(v.size(), 10);
    }

    #[test]
    fn reading_end_to_end_yields_the_concatenation() {
        let mut v = TarVec::new(vec![Box::new(MemVector::new(*b"abc")), Box::new(PaddingVector::new(3)), Box::new(MemVector::new(*b"xy"))]);
        let out = read_all(&mut v);
        assert_eq!(out, b"abc\0\0\0xy");
    }

    #[test]
    fn zero_size_vectors_in_the_middle_are_transparently_skipped() {
        let mut v = TarVec::new(vec![Box::new(MemVector::new(*b"a")), Box::new(PaddingVector::new(0)), Box::new(MemVector::new(*b"b"))]);
        assert_eq!(read_all(&mut v), b"ab");
    }

    #[test]
    fn seek_from_start_lands_in_the_middle_of_a_vector() {
        let mut v = TarVec::new(vec![Box::new(MemVector::new(*b"abc")), Box::new(MemVector::new(*b"defgh"))]);
        v.seek(SeekFrom::Start(4)).unwrap();
        assert_eq!(read_all(&mut v), b"efgh");
    }

    #[test]
    fn seek_from_end_and_current_are_relative() {
        let mut v = TarVec::new(vec![Box::new(MemVector::new(*b"0123456789"))]);
        v.seek(SeekFrom::End(-3)).unwrap();
        assert_eq!(read_all(&mut v), b"789");

        v.seek(SeekFrom::Start(2)).unwrap();
        v.seek(SeekFrom::Current(3)).unwrap();
        assert_eq!(read_all(&mut v), b"56789");
    }

    #[test]
    fn seek_to_a_negative_position_is_rejected() {
        let mut v = TarVec::new(vec![Box::new(MemVector::new(*b"abc"))]);
        assert!(v.seek(SeekFrom::Current(-1)).is_err());
    }

    #[test]
    fn seeking_past_the_end_then_reading_yields_eof() {
        let mut v = TarVec::new(vec![Box::new(MemVector::new(*b"abc"))]);
        v.seek(SeekFrom::Start(100)).unwrap();
        assert_eq!(read_all(&mut v), Vec::<u8>::new());
    }

    #[test]
    fn close_drops_the_open_vector_without_losing_position() {
        let mut v = TarVec::new(vec![Box::new(MemVector::new(*b"abcdef"))]);
        let mut buf = [0u8; 3];
        v.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        v.close();
        assert_eq!(v.position(), 3);
        let mut rest = Vec::new();
        v.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"def");
    }

    #[test]
    fn mixes_memory_padding_and_file_backed_vectors() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"FILEDATA").unwrap();
        let mut v = TarVec::new(vec![
            Box::new(MemVector::new(*b"HDR:")),
            Box::new(FileVector::whole_file(tmp.path()).unwrap()),
            Box::new(PaddingVector::new(2)),
        ]);
        assert_eq!(v.size(), 14);
        assert_eq!(read_all(&mut v), b"HDR:FILEDATA\0\0");
    }
}
