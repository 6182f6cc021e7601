use crate::Result;
use std::io;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};

pub struct BufReaderWithPos<R: Read + Seek> {
    reader: BufReader<R>,
    pos: u64,
    #[cfg(debug_assertions)]
    end: u64,
}

impl<R: Read + Seek> BufReaderWithPos<R> {
    pub(crate) fn new(mut inner: R) -> Result<Self> {
        let pos = inner.stream_position()?;
        #[cfg(debug_assertions)]
        let end = {
            let end = inner.seek(SeekFrom::End(0))?;
            inner.seek(SeekFrom::Start(pos))?;
            end
        };

        Ok(BufReaderWithPos {
            reader: BufReader::new(inner),
            pos,
            #[cfg(debug_assertions)]
            end,
        })
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }
}

impl<R: Read + Seek> Read for BufReaderWithPos<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.reader.read(buf)?;
        self.pos += len as u64;
        #[cfg(debug_assertions)]
        debug_assert!(self.pos <= self.end, "{}, {}", self.pos, self.end);
        Ok(len)
    }
}

impl<R: Read + Seek> Seek for BufReaderWithPos<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.reader.seek(pos)?;
        Ok(self.pos)
    }
}

pub struct BufWriterWithPos<W: Write + Seek> {
    writer: BufWriter<W>,
    pub pos: u64,
}

impl<W: Write + Seek> BufWriterWithPos<W> {
    pub fn with_capacity(capacity: usize, mut inner: W) -> Result<Self> {
        let pos = inner.seek(SeekFrom::End(0))?;
        Ok(BufWriterWithPos {
            writer: BufWriter::with_capacity(capacity, inner),
            pos,
        })
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.writer.get_mut()
    }
}

impl<W: Write + Seek> Write for BufWriterWithPos<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = self.writer.write(buf)?;
        self.pos += len as u64;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<W: Write + Seek> Seek for BufWriterWithPos<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.writer.seek(pos)?;
        Ok(self.pos)
    }
}

pub fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut nums = [0u8; 4];
    reader.read_exact(&mut nums)?;
    Ok(u32::from_le_bytes(nums))
}

pub fn read_u64(reader: &mut impl Read) -> Result<u64> {
    let mut nums = [0u8; 8];
    reader.read_exact(&mut nums)?;
    Ok(u64::from_le_bytes(nums))
}

pub fn read_bytes_exact(reader: &mut impl Read, length: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(length as usize);
    reader.take(length).read_to_end(&mut buf)?;
    if buf.len() as u64 != length {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(buf)
}

pub fn u32_from_le_bytes(bytes: &[u8]) -> u32 {
    debug_assert_eq!(bytes.len(), 4);
    let mut buf = [0u8; 4];
    buf.clone_from_slice(bytes);
    u32::from_le_bytes(buf)
}
