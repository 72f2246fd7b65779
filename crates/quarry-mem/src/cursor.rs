//! A file-object-shaped view over a window of memory.

use std::io;

use quarry_arch::Addr;

use crate::RawMemory;

/// Adapts a window of a [`RawMemory`] implementor to [`io::Read`],
/// [`io::Write`], and [`io::Seek`].
///
/// The Rust analogue of the source project's file-like `MemoryIO` object:
/// `std::io::copy` can move bytes between a `MemoryCursor` and a real file
/// exactly as `shutil.copyfileobj` does against the Python original.
/// Reads and writes past the end of the window do not wrap or extend it:
/// reads past the end report EOF (`Ok(0)`), writes past the end fail.
pub struct MemoryCursor<'a, M: RawMemory + ?Sized> {
    mem: &'a mut M,
    start: Addr,
    size: u64,
    pos: u64,
}

impl<'a, M: RawMemory + ?Sized> MemoryCursor<'a, M> {
    /// Creates a cursor over `[start, start + size)` of `mem`, positioned at
    /// the start of the window.
    pub fn bounded(mem: &'a mut M, start: Addr, size: u64) -> Self {
        Self {
            mem,
            start,
            size,
            pos: 0,
        }
    }

    /// Number of bytes remaining between the current position and the end
    /// of the window.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.size.saturating_sub(self.pos)
    }
}

impl<M: RawMemory + ?Sized> io::Read for MemoryCursor<'_, M> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = (buf.len() as u64).min(self.remaining()) as usize;
        if want == 0 {
            return Ok(0);
        }
        let data = self
            .mem
            .raw_read(self.start + self.pos, want as u64)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
        buf[..data.len()].copy_from_slice(&data);
        self.pos += data.len() as u64;
        Ok(data.len())
    }
}

impl<M: RawMemory + ?Sized> io::Write for MemoryCursor<'_, M> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let want = (buf.len() as u64).min(self.remaining()) as usize;
        if want == 0 && !buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write past the end of the memory window",
            ));
        }
        self.mem
            .raw_write(self.start + self.pos, &buf[..want])
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
        self.pos += want as u64;
        Ok(want)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<M: RawMemory + ?Sized> io::Seek for MemoryCursor<'_, M> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            io::SeekFrom::Start(offset) => offset as i128,
            io::SeekFrom::End(offset) => self.size as i128 + offset as i128,
            io::SeekFrom::Current(offset) => self.pos as i128 + offset as i128,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            ));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryAccessError;
    use std::io::{Read, Seek, SeekFrom, Write};

    struct Flat(Vec<u8>);

    impl RawMemory for Flat {
        fn raw_read(&self, address: Addr, size: u64) -> Result<Vec<u8>, MemoryAccessError> {
            let start = address as usize;
            let end = start + size as usize;
            Ok(self.0[start..end].to_vec())
        }

        fn raw_write(&mut self, address: Addr, data: &[u8]) -> Result<(), MemoryAccessError> {
            let start = address as usize;
            self.0[start..start + data.len()].copy_from_slice(data);
            Ok(())
        }
    }

    #[test]
    fn read_stops_at_window_end() {
        let mut mem = Flat(vec![1, 2, 3, 4, 5, 6]);
        let mut cursor = MemoryCursor::bounded(&mut mem, 1, 3);
        let mut buf = [0u8; 16];
        let n = cursor.read(&mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[2, 3, 4]);
        let n = cursor.read(&mut buf).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn write_past_end_fails() {
        let mut mem = Flat(vec![0; 4]);
        let mut cursor = MemoryCursor::bounded(&mut mem, 0, 2);
        assert!(cursor.write_all(&[1, 2, 3]).is_err());
    }

    #[test]
    fn seek_from_end_repositions() {
        let mut mem = Flat(vec![9; 8]);
        let mut cursor = MemoryCursor::bounded(&mut mem, 0, 8);
        cursor.seek(SeekFrom::End(-2)).unwrap();
        assert_eq!(cursor.remaining(), 2);
    }
}
