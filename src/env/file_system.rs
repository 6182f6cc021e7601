use crate::ioutils::{BufReaderWithPos, BufWriterWithPos};
use crate::options::WriterOptions;
use crate::Result;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

pub struct FileSystem {}

impl FileSystem {
    pub fn create_seq_readable_file(path: &Path) -> Result<Box<dyn SequentialReadableFile>> {
        #[cfg(feature = "mmap")]
        {
            use crate::env::file_system::mmap::MmapFile;
            Ok(Box::new(MmapFile::open(path)?))
        }
        #[cfg(not(feature = "mmap"))]
        {
            Ok(Box::new(BufReaderWithPos::new(File::open(path)?)?))
        }
    }
}

pub trait SequentialReadableFile: Read + Seek {
    fn position(&self) -> usize;
}

impl SequentialReadableFile for BufReaderWithPos<File> {
    fn position(&self) -> usize {
        self.pos() as usize
    }
}

/// Append-only output file.
pub trait FileWriter: Write {
    /// Number of bytes written so far, including still buffered ones.
    fn position(&self) -> u64;

    /// Flush buffered bytes. The writer must not be used afterwards.
    fn close(&mut self) -> Result<()>;
}

pub struct BufferedFileWriter {
    writer: BufWriterWithPos<File>,
    sync_on_close: bool,
}

impl Write for BufferedFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl FileWriter for BufferedFileWriter {
    #[inline]
    fn position(&self) -> u64 {
        self.writer.pos
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        if self.sync_on_close {
            self.writer.get_mut().sync_data()?;
        }
        Ok(())
    }
}

/// Handle of the directory a table is dumped into.
pub trait Directory {
    fn create_file_writer(
        &self,
        name: &str,
        options: &WriterOptions,
    ) -> Result<Box<dyn FileWriter>>;

    fn open_file_reader(&self, name: &str) -> Result<Box<dyn SequentialReadableFile>>;
}

pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    /// Open `root`, creating it if missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<FsDirectory> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(FsDirectory { root })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.root
    }
}

impl Directory for FsDirectory {
    fn create_file_writer(
        &self,
        name: &str,
        options: &WriterOptions,
    ) -> Result<Box<dyn FileWriter>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.root.join(name))?;
        Ok(Box::new(BufferedFileWriter {
            writer: BufWriterWithPos::with_capacity(options.buffer_size, file)?,
            sync_on_close: options.sync_on_close,
        }))
    }

    fn open_file_reader(&self, name: &str) -> Result<Box<dyn SequentialReadableFile>> {
        FileSystem::create_seq_readable_file(&self.root.join(name))
    }
}

#[cfg(feature = "mmap")]
pub mod mmap {
    use crate::env::file_system::SequentialReadableFile;
    use crate::Result;
    use memmap::{Mmap, MmapOptions};
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom};
    use std::path::Path;

    pub struct MmapFile {
        _file: File,
        mmap: Option<Mmap>,
        pos: usize,
    }

    impl MmapFile {
        pub fn open(path: &Path) -> Result<MmapFile> {
            let file = File::open(path)?;
            // zero-length files cannot be mapped
            let mmap = if file.metadata()?.len() == 0 {
                None
            } else {
                Some(unsafe { MmapOptions::new().map(&file)? })
            };
            Ok(MmapFile {
                _file: file,
                mmap,
                pos: 0,
            })
        }

        fn data(&self) -> &[u8] {
            self.mmap.as_deref().unwrap_or(&[])
        }
    }

    impl Read for MmapFile {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let data_len = self.data().len();
            let start = self.pos.min(data_len);
            let new_pos = (start + buf.len()).min(data_len);
            let nbytes = new_pos - start;
            buf[..nbytes].copy_from_slice(&self.data()[start..new_pos]);
            self.pos = new_pos;
            Ok(nbytes)
        }
    }

    impl Seek for MmapFile {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            match pos {
                SeekFrom::Start(p) => self.pos = p as usize,
                SeekFrom::Current(p) => self.pos = (self.pos as i64 + p) as usize,
                SeekFrom::End(p) => self.pos = (self.data().len() as i64 + p) as usize,
            }
            Ok(self.pos as u64)
        }
    }

    impl SequentialReadableFile for MmapFile {
        fn position(&self) -> usize {
            self.pos
        }
    }
}
